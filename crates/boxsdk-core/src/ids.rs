//! Subject identifiers for JWT authentication.
//!
//! A token is issued either for an app user or for a whole enterprise. The
//! types here name those subjects and carry the `box_sub_type` tag that
//! distinguishes them on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object type reported by user handles.
const USER_OBJECT_TYPE: &str = "user";

/// A Box user identifier.
///
/// User IDs are opaque strings assigned by the API. The only requirement
/// enforced here is that they are non-empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a `UserId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(id))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A Box enterprise identifier.
///
/// Used as the subject when authenticating as the enterprise itself
/// ("instance" authentication).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnterpriseId(String);

impl EnterpriseId {
    /// Create an `EnterpriseId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(id))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EnterpriseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnterpriseId({})", self.0)
    }
}

impl fmt::Display for EnterpriseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EnterpriseId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EnterpriseId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EnterpriseId> for String {
    fn from(id: EnterpriseId) -> Self {
        id.0
    }
}

impl AsRef<str> for EnterpriseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The kind of subject a token is issued for.
///
/// Serialized as the `box_sub_type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    /// An individual (app) user.
    User,
    /// The enterprise as a whole.
    Enterprise,
}

impl SubjectType {
    /// Return the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user object, as returned by the users API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    object_id: String,
}

impl User {
    /// Create a handle for the user with the given id.
    #[must_use]
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
        }
    }

    /// The user's id.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

/// A reference to an arbitrary API object.
///
/// Only handles whose type is `"user"` and which carry an id can name a
/// user subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    object_type: String,
    object_id: Option<String>,
}

impl ObjectHandle {
    /// Create a handle for an object of the given type.
    #[must_use]
    pub fn new(object_type: impl Into<String>, object_id: Option<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id,
        }
    }

    /// The object's type (e.g. `"user"`, `"folder"`).
    #[must_use]
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// The object's id, if known.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }
}

/// Anything that can name the user to authenticate as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentifier {
    /// A raw user id string.
    Id(String),
    /// A user object.
    User(User),
    /// Some other API object; accepted only if it is a user with an id.
    Object(ObjectHandle),
}

impl UserIdentifier {
    /// Resolve to a `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::UnsupportedType` for handles that are not users or
    /// carry no id, and `IdError::Empty` for empty ids.
    pub fn resolve(&self) -> Result<UserId, IdError> {
        match self {
            Self::Id(id) => UserId::new(id.as_str()),
            Self::User(user) => UserId::new(user.object_id()),
            Self::Object(handle) => match handle.object_id() {
                Some(id) if handle.object_type() == USER_OBJECT_TYPE => UserId::new(id),
                _ => Err(IdError::UnsupportedType(handle.object_type().to_string())),
            },
        }
    }
}

impl From<&str> for UserIdentifier {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for UserIdentifier {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<UserId> for UserIdentifier {
    fn from(id: UserId) -> Self {
        Self::Id(id.0)
    }
}

impl From<User> for UserIdentifier {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}

impl From<ObjectHandle> for UserIdentifier {
    fn from(handle: ObjectHandle) -> Self {
        Self::Object(handle)
    }
}

/// Errors that can occur when building identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier must not be empty")]
    Empty,

    /// The value cannot identify a user.
    #[error("unsupported identifier type: {0}")]
    UnsupportedType(String),
}
