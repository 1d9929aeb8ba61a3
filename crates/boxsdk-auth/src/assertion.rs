//! JWT assertion construction.
//!
//! An assertion is a short-lived JWT, signed with the application's private
//! key, that names the subject a token is requested for. The token endpoint
//! verifies it against the public key registered under `kid`.

use std::sync::Arc;

use boxsdk_core::SubjectType;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Header};
use serde::{Deserialize, Serialize};

use crate::config::SigningAlgorithm;
use crate::entropy::SecureRandom;
use crate::error::{AuthError, Result};
use crate::identity::Subject;
use crate::key::SigningKey;

/// The `aud` claim: the token endpoint the assertion is intended for.
pub const TOKEN_AUDIENCE: &str = "https://api.box.com/oauth2/token";

/// Seconds between issuance and the `exp` claim.
pub const ASSERTION_LIFETIME_SECONDS: i64 = 30;

/// Shortest `jti` generated.
pub const JTI_MIN_LENGTH: usize = 16;

/// Longest `jti` generated.
pub const JTI_MAX_LENGTH: usize = 128;

/// Characters a `jti` is drawn from.
const JTI_ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The claim set of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer: the client id.
    pub iss: String,
    /// Subject: a user or enterprise id.
    pub sub: String,
    /// Whether `sub` names a user or an enterprise.
    pub box_sub_type: SubjectType,
    /// Audience: the token endpoint.
    pub aud: String,
    /// Unique token id.
    pub jti: String,
    /// Expiry, in seconds since the epoch.
    pub exp: i64,
}

/// Generate a `jti`.
///
/// The length is drawn uniformly from
/// `JTI_MIN_LENGTH..=JTI_MAX_LENGTH`, then each character uniformly from
/// `[A-Za-z0-9]`, one `unit_f64` draw per character.
#[must_use]
pub fn generate_jti(random: &dyn SecureRandom) -> String {
    let length = random.range_inclusive(JTI_MIN_LENGTH, JTI_MAX_LENGTH);
    (0..length)
        .map(|_| char::from(JTI_ALPHABET[alphabet_index(random.unit_f64())]))
        .collect()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn alphabet_index(draw: f64) -> usize {
    let index = (draw * JTI_ALPHABET.len() as f64).floor() as usize;
    index.min(JTI_ALPHABET.len() - 1)
}

/// Builds and signs assertions for one application.
pub struct AssertionBuilder {
    client_id: String,
    key: SigningKey,
    key_id: String,
    algorithm: SigningAlgorithm,
    random: Arc<dyn SecureRandom>,
}

impl AssertionBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        key: SigningKey,
        key_id: impl Into<String>,
        algorithm: SigningAlgorithm,
        random: Arc<dyn SecureRandom>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            key,
            key_id: key_id.into(),
            algorithm,
            random,
        }
    }

    /// Replace the random source.
    pub fn set_random(&mut self, random: Arc<dyn SecureRandom>) {
        self.random = random;
    }

    /// The claim set for `subject` issued at `now`, with a fresh `jti`.
    #[must_use]
    pub fn claims(&self, subject: &Subject, now: DateTime<Utc>) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_id.clone(),
            sub: subject.id().to_string(),
            box_sub_type: subject.subject_type(),
            aud: TOKEN_AUDIENCE.to_string(),
            jti: generate_jti(self.random.as_ref()),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECONDS,
        }
    }

    /// Build the signed, compact-serialized assertion for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the key cannot sign with the
    /// configured algorithm.
    pub fn build_assertion(&self, subject: &Subject, now: DateTime<Utc>) -> Result<String> {
        let claims = self.claims(subject, now);

        let mut header = Header::new(self.algorithm.into());
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}
