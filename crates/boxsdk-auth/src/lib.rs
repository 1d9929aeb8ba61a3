//! JWT-bearer authentication for the Box API.
//!
//! Server-side applications authenticate without a user present by signing
//! a short-lived JWT assertion with their RSA private key and exchanging it
//! at the token endpoint for an access token. The token is issued either for
//! an app user or for the enterprise as a whole ("instance" authentication).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   API client     │────▶│  JwtAuth         │
//! │   (refresh hook) │     │  (public API)    │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!              ┌────────────────────┼────────────────────┐
//!     ┌────────▼─────────┐ ┌────────▼─────────┐ ┌────────▼─────────┐
//!     │ IdentityTracker  │ │ AssertionBuilder │ │TokenExchangeClient│
//!     │ (subject)        │ │ (sign claims)    │ │ (form POST)      │
//!     └──────────────────┘ └────────┬─────────┘ └────────┬─────────┘
//!                                   │                    │
//!                          ┌────────▼─────────┐ ┌────────▼─────────┐
//!                          │ Key loader       │ │ NetworkLayer     │
//!                          │ (PEM → key)      │ │ (reqwest)        │
//!                          └──────────────────┘ └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use boxsdk_auth::{JwtAuth, JwtAuthConfig, PrivateKeySource};
//! use boxsdk_core::EnterpriseId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JwtAuthConfig::new(
//!     "client_id",
//!     "client_secret",
//!     PrivateKeySource::Path(PathBuf::from("/etc/box/private_key.pem")),
//!     "public_key_id",
//! )
//! .with_passphrase("passphrase")
//! .with_enterprise_id(EnterpriseId::new("1234567")?);
//!
//! let auth = JwtAuth::with_default_network(config)?;
//!
//! // Act as the enterprise...
//! let token = auth.authenticate_instance(None).await?;
//!
//! // ...or as one of its app users.
//! let user_token = auth.authenticate_user(Some("987654".into())).await?;
//! # let _ = (token, user_token);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assertion;
pub mod config;
pub mod entropy;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod jwt_auth;
pub mod key;
pub mod network;

pub use assertion::{AssertionBuilder, AssertionClaims, TOKEN_AUDIENCE};
pub use config::{ApiConfig, JwtAuthConfig, SigningAlgorithm};
pub use entropy::{Clock, OsRandom, SecureRandom, SystemClock};
pub use error::{AuthError, Result};
pub use exchange::{TokenExchangeClient, JWT_GRANT_TYPE};
pub use identity::{BindingState, IdentityTracker, Subject};
pub use jwt_auth::{JwtAuth, TokenRefresher};
pub use key::{load_private_key, KeyDecoder, PemKeyDecoder, PrivateKeySource, SigningKey};
pub use network::{DefaultNetwork, Method, NetworkError, NetworkLayer, NetworkRequest, NetworkResponse};

#[cfg(any(test, feature = "test-utils"))]
pub use entropy::{FixedClock, ScriptedRandom};
#[cfg(any(test, feature = "test-utils"))]
pub use network::MockNetworkLayer;
