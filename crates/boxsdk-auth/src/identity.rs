//! Tracking which subject an authenticator acts as.
//!
//! An authenticator works either in user mode or in instance (enterprise)
//! mode. The user id may change from call to call; the enterprise id is
//! fixed once known. Resolution never mutates the tracker: the chosen
//! subject is committed only after the token exchange succeeds.

use std::fmt;

use boxsdk_core::{EnterpriseId, IdError, SubjectType, UserId, UserIdentifier};

use crate::error::{AuthError, Result};

/// A resolved token subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// An app user.
    User(UserId),
    /// The enterprise itself.
    Enterprise(EnterpriseId),
}

impl Subject {
    /// The `box_sub_type` of this subject.
    #[must_use]
    pub const fn subject_type(&self) -> SubjectType {
        match self {
            Self::User(_) => SubjectType::User,
            Self::Enterprise(_) => SubjectType::Enterprise,
        }
    }

    /// The subject id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Enterprise(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type(), self.id())
    }
}

/// The active binding of an authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    /// No subject known yet.
    Unbound,
    /// Authenticating as a user.
    BoundUser(UserId),
    /// Authenticating as the enterprise.
    BoundEnterprise(EnterpriseId),
}

/// Remembers the user and enterprise an authenticator acts for.
#[derive(Debug, Clone, Default)]
pub struct IdentityTracker {
    user_id: Option<UserId>,
    enterprise_id: Option<EnterpriseId>,
}

impl IdentityTracker {
    /// Create an unbound tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker seeded with an initial user and/or enterprise.
    ///
    /// When both are given, user mode is active. An empty user id counts as
    /// no user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedIdentityType` if `user` cannot
    /// identify a user.
    pub fn seeded(user: Option<&UserIdentifier>, enterprise_id: Option<EnterpriseId>) -> Result<Self> {
        let user_id = match user.map(UserIdentifier::resolve) {
            Some(Ok(user_id)) => Some(user_id),
            Some(Err(IdError::Empty)) | None => None,
            Some(Err(err)) => return Err(err.into()),
        };
        Ok(Self {
            user_id,
            enterprise_id,
        })
    }

    /// The active binding.
    #[must_use]
    pub fn state(&self) -> BindingState {
        match (&self.user_id, &self.enterprise_id) {
            (Some(user_id), _) => BindingState::BoundUser(user_id.clone()),
            (None, Some(enterprise_id)) => BindingState::BoundEnterprise(enterprise_id.clone()),
            (None, None) => BindingState::Unbound,
        }
    }

    /// The enterprise id, if known.
    #[must_use]
    pub const fn enterprise_id(&self) -> Option<&EnterpriseId> {
        self.enterprise_id.as_ref()
    }

    /// The user id, if bound.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Pick the user subject for the next exchange.
    ///
    /// An explicit user wins and replaces any previously bound user once
    /// committed. Without one, or with an empty id, the bound user is
    /// reused.
    ///
    /// # Errors
    ///
    /// - `UnsupportedIdentityType` if `explicit` cannot identify a user
    /// - `MissingSubject` if no usable id is given and no user is bound
    pub fn resolve_user(&self, explicit: Option<&UserIdentifier>) -> Result<Subject> {
        match explicit.map(UserIdentifier::resolve) {
            Some(Ok(user_id)) => Ok(Subject::User(user_id)),
            Some(Err(IdError::Empty)) | None => self
                .user_id
                .clone()
                .map(Subject::User)
                .ok_or(AuthError::MissingSubject(SubjectType::User)),
            Some(Err(err)) => Err(err.into()),
        }
    }

    /// Pick the enterprise subject for the next exchange.
    ///
    /// # Errors
    ///
    /// - `IdentityMismatch` if `explicit` differs from the known enterprise
    /// - `MissingSubject` if nothing is given and no enterprise is known
    pub fn resolve_enterprise(&self, explicit: Option<&EnterpriseId>) -> Result<Subject> {
        match (explicit, &self.enterprise_id) {
            (Some(requested), Some(bound)) if requested != bound => {
                Err(AuthError::IdentityMismatch {
                    bound: bound.to_string(),
                    requested: requested.to_string(),
                })
            }
            (Some(requested), _) => Ok(Subject::Enterprise(requested.clone())),
            (None, Some(bound)) => Ok(Subject::Enterprise(bound.clone())),
            (None, None) => Err(AuthError::MissingSubject(SubjectType::Enterprise)),
        }
    }

    /// The subject to re-authenticate as: the bound user if any, else the
    /// enterprise.
    ///
    /// # Errors
    ///
    /// Returns `MissingSubject` if the tracker is unbound.
    pub fn resolve_current(&self) -> Result<Subject> {
        match self.state() {
            BindingState::BoundUser(user_id) => Ok(Subject::User(user_id)),
            BindingState::BoundEnterprise(enterprise_id) => Ok(Subject::Enterprise(enterprise_id)),
            BindingState::Unbound => Err(AuthError::MissingSubject(SubjectType::Enterprise)),
        }
    }

    /// Bind `subject` after a successful exchange.
    ///
    /// Binding an enterprise switches to instance mode and drops the user.
    ///
    /// # Errors
    ///
    /// Returns `IdentityMismatch` if another enterprise was bound while the
    /// exchange was in flight.
    pub fn commit(&mut self, subject: &Subject) -> Result<()> {
        match subject {
            Subject::User(user_id) => {
                self.user_id = Some(user_id.clone());
            }
            Subject::Enterprise(enterprise_id) => {
                if let Some(bound) = &self.enterprise_id {
                    if bound != enterprise_id {
                        return Err(AuthError::IdentityMismatch {
                            bound: bound.to_string(),
                            requested: enterprise_id.to_string(),
                        });
                    }
                }
                self.enterprise_id = Some(enterprise_id.clone());
                self.user_id = None;
            }
        }
        Ok(())
    }
}
