//! Core types for the Box SDK authentication crates.
//!
//! This crate provides the identifiers that name a token subject:
//!
//! - **Subjects**: `UserId` and `EnterpriseId`, plus the `SubjectType` tag
//!   sent as the `box_sub_type` claim
//! - **User handles**: `User` objects and the `UserIdentifier` accepted by
//!   user authentication
//!
//! # Example
//!
//! ```
//! use boxsdk_core::{EnterpriseId, SubjectType, User, UserIdentifier};
//!
//! let enterprise = EnterpriseId::new("1234567").unwrap();
//! assert_eq!(enterprise.as_str(), "1234567");
//!
//! // A user may be named by id or by a fetched user object.
//! let by_id = UserIdentifier::from("987654");
//! let by_handle = UserIdentifier::from(User::new("987654"));
//! assert_eq!(by_id.resolve().unwrap(), by_handle.resolve().unwrap());
//!
//! assert_eq!(SubjectType::Enterprise.as_str(), "enterprise");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{EnterpriseId, IdError, ObjectHandle, SubjectType, User, UserId, UserIdentifier};
