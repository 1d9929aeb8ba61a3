//! The public JWT authentication API.
//!
//! `JwtAuth` ties the pieces together: each call resolves the subject,
//! signs a fresh assertion, exchanges it for an access token and, only on
//! success, records the subject and token.

use std::sync::Arc;

use async_trait::async_trait;
use boxsdk_core::{EnterpriseId, UserIdentifier};
use parking_lot::RwLock;

use crate::assertion::AssertionBuilder;
use crate::config::JwtAuthConfig;
use crate::entropy::{Clock, OsRandom, SecureRandom, SystemClock};
use crate::error::{AuthError, Result};
use crate::exchange::TokenExchangeClient;
use crate::identity::{BindingState, IdentityTracker, Subject};
use crate::key::{load_private_key, KeyDecoder, PemKeyDecoder};
use crate::network::{DefaultNetwork, NetworkLayer};

/// Something that can produce a fresh access token.
///
/// Implemented by every authenticator so the API client can renew tokens
/// without knowing which flow is in use.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new access token. `access_token` is the one being replaced;
    /// flows that do not need it ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if a new token cannot be obtained.
    async fn refresh(&self, access_token: Option<&str>) -> Result<String>;
}

/// Mutable state, updated together after each successful exchange.
#[derive(Debug, Default)]
struct AuthState {
    identity: IdentityTracker,
    access_token: Option<String>,
}

/// JWT-bearer authenticator for one application.
///
/// Safe to share between tasks. Concurrent calls each perform their own
/// exchange; the last one to commit determines the binding and the stored
/// token. An exchange for an enterprise other than the one bound while it
/// was in flight fails with `IdentityMismatch`.
pub struct JwtAuth {
    assertions: AssertionBuilder,
    exchange: TokenExchangeClient,
    clock: Arc<dyn Clock>,
    state: RwLock<AuthState>,
}

impl JwtAuth {
    /// Create an authenticator, loading the private key from `config`.
    ///
    /// # Errors
    ///
    /// - `KeyRead`/`KeyDecode` if the key cannot be loaded
    /// - `UnsupportedIdentityType` if the configured user cannot identify
    ///   a user
    pub fn new(config: JwtAuthConfig, network: Arc<dyn NetworkLayer>) -> Result<Self> {
        Self::with_decoder(config, network, &PemKeyDecoder)
    }

    /// Create an authenticator that sends requests with `DefaultNetwork`.
    ///
    /// # Errors
    ///
    /// Same as [`JwtAuth::new`], plus `Config` if the HTTP client cannot be
    /// built.
    pub fn with_default_network(config: JwtAuthConfig) -> Result<Self> {
        let network =
            DefaultNetwork::new(&config.api).map_err(|e| AuthError::Config(e.to_string()))?;
        Self::new(config, Arc::new(network))
    }

    /// Create an authenticator using a custom key decoder.
    ///
    /// # Errors
    ///
    /// Same as [`JwtAuth::new`].
    pub fn with_decoder(
        config: JwtAuthConfig,
        network: Arc<dyn NetworkLayer>,
        decoder: &dyn KeyDecoder,
    ) -> Result<Self> {
        let key = load_private_key(&config.private_key, config.passphrase.as_deref(), decoder)?;
        let identity = IdentityTracker::seeded(config.user.as_ref(), config.enterprise_id)?;

        tracing::debug!(
            client_id = %config.client_id,
            key_id = %config.key_id,
            algorithm = ?config.algorithm,
            binding = ?identity.state(),
            "JWT authenticator created"
        );

        let random: Arc<dyn SecureRandom> = Arc::new(OsRandom);
        let assertions = AssertionBuilder::new(
            config.client_id.clone(),
            key,
            config.key_id,
            config.algorithm,
            random,
        );
        let exchange = TokenExchangeClient::new(
            config.client_id,
            config.client_secret,
            config.device_name,
            config.api.token_url(),
            network,
        );

        Ok(Self {
            assertions,
            exchange,
            clock: Arc::new(SystemClock),
            state: RwLock::new(AuthState {
                identity,
                access_token: None,
            }),
        })
    }

    /// Use `clock` for assertion issuance times.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `random` for `jti` generation.
    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn SecureRandom>) -> Self {
        self.assertions.set_random(random);
        self
    }

    /// The most recently issued access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    /// The subject this authenticator currently acts as.
    #[must_use]
    pub fn binding(&self) -> BindingState {
        self.state.read().identity.state()
    }

    /// Authenticate as a user.
    ///
    /// With `user`, authenticates as that user and remembers it for later
    /// calls. Without, reuses the remembered user.
    ///
    /// # Errors
    ///
    /// - `MissingSubject` if no user is given or remembered
    /// - `UnsupportedIdentityType` if `user` cannot identify a user
    /// - `Authentication` if the token endpoint rejects the assertion
    pub async fn authenticate_user(&self, user: Option<UserIdentifier>) -> Result<String> {
        let subject = self.state.read().identity.resolve_user(user.as_ref())?;
        self.authenticate(subject).await
    }

    /// Authenticate as the enterprise.
    ///
    /// # Errors
    ///
    /// - `MissingSubject` if no enterprise id is given or configured
    /// - `IdentityMismatch` if `enterprise_id` differs from the known one
    /// - `Authentication` if the token endpoint rejects the assertion
    pub async fn authenticate_instance(&self, enterprise_id: Option<EnterpriseId>) -> Result<String> {
        let subject = self
            .state
            .read()
            .identity
            .resolve_enterprise(enterprise_id.as_ref())?;
        self.authenticate(subject).await
    }

    /// Re-authenticate as the current subject. The argument is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`JwtAuth::authenticate_user`] and
    /// [`JwtAuth::authenticate_instance`].
    pub async fn refresh(&self, _access_token: Option<&str>) -> Result<String> {
        let subject = self.state.read().identity.resolve_current()?;
        self.authenticate(subject).await
    }

    async fn authenticate(&self, subject: Subject) -> Result<String> {
        let assertion = self.assertions.build_assertion(&subject, self.clock.now())?;

        tracing::debug!(
            subject_type = %subject.subject_type(),
            subject_id = %subject.id(),
            "Exchanging JWT assertion"
        );

        let token = self.exchange.exchange(&assertion).await?;

        let mut state = self.state.write();
        state.identity.commit(&subject)?;
        state.access_token = Some(token.clone());
        drop(state);

        tracing::info!(
            subject_type = %subject.subject_type(),
            subject_id = %subject.id(),
            "Authenticated"
        );

        Ok(token)
    }
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth")
            .field("token_url", &self.exchange.token_url())
            .field("binding", &self.binding())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for JwtAuth {
    async fn refresh(&self, access_token: Option<&str>) -> Result<String> {
        Self::refresh(self, access_token).await
    }
}
