//! Authentication error types.

use std::path::PathBuf;

use boxsdk_core::{IdError, SubjectType};
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during JWT authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The private key file could not be read.
    #[error("failed to read private key from {}: {source}", .path.display())]
    KeyRead {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The private key could not be decoded (malformed PEM or wrong passphrase).
    #[error("failed to decode private key: {0}")]
    KeyDecode(String),

    /// No subject was supplied and none is bound yet.
    #[error("{0} id required: none given and none previously authenticated")]
    MissingSubject(SubjectType),

    /// The value given as a user cannot identify one.
    #[error("unsupported user identifier type: {0}")]
    UnsupportedIdentityType(String),

    /// The enterprise id conflicts with the one already bound.
    #[error("enterprise id mismatch: bound to {bound}, got {requested}")]
    IdentityMismatch {
        /// The enterprise id already in use.
        bound: String,
        /// The enterprise id passed in.
        requested: String,
    },

    /// The token endpoint rejected the request, returned an unusable body,
    /// or could not be reached.
    #[error("authentication failed ({}): {body}", describe_status(*.status))]
    Authentication {
        /// HTTP status, or `None` when no response was received.
        status: Option<u16>,
        /// Response body or transport error description.
        body: String,
    },

    /// The assertion could not be signed.
    #[error("failed to sign assertion: {0}")]
    Signing(String),

    /// An identifier was malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(IdError),

    /// App settings could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn describe_status(status: Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |s| format!("HTTP {s}"))
}

impl From<IdError> for AuthError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::UnsupportedType(kind) => Self::UnsupportedIdentityType(kind),
            other @ IdError::Empty => Self::InvalidId(other),
        }
    }
}

impl AuthError {
    /// Returns `true` for either form of key loading failure.
    #[must_use]
    pub const fn is_key_load_error(&self) -> bool {
        matches!(self, Self::KeyRead { .. } | Self::KeyDecode(_))
    }

    /// Returns `true` if repeating the call may succeed.
    ///
    /// Transport failures and 429/5xx responses from the token endpoint
    /// qualify. Nothing in this crate retries on its own.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Authentication { status: None, .. } => true,
            Self::Authentication {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns the token endpoint status code, if this error carries one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            _ => None,
        }
    }
}
