//! Configuration for JWT authentication.
//!
//! `ApiConfig` holds endpoint and timeout settings; `JwtAuthConfig` holds the
//! application's credentials and the optional initial subject. A
//! `JwtAuthConfig` can also be read from the JSON settings document that the
//! Box developer console generates for server-authentication apps.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use boxsdk_core::{EnterpriseId, UserIdentifier};
use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::key::PrivateKeySource;

/// Endpoint and transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the OAuth2 API (e.g., `https://api.box.com/oauth2`).
    #[serde(default = "ApiConfig::default_oauth2_api_url")]
    pub oauth2_api_url: String,

    /// Total request timeout in seconds.
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "ApiConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl ApiConfig {
    fn default_oauth2_api_url() -> String {
        "https://api.box.com/oauth2".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Get the token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/token", self.oauth2_api_url.trim_end_matches('/'))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            oauth2_api_url: Self::default_oauth2_api_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

/// Asymmetric algorithms accepted for signing assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[default]
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RS512,
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::RS256 => Self::RS256,
            SigningAlgorithm::RS384 => Self::RS384,
            SigningAlgorithm::RS512 => Self::RS512,
        }
    }
}

/// Everything needed to construct a `JwtAuth`.
#[derive(Clone)]
pub struct JwtAuthConfig {
    /// OAuth2 client id; also the assertion issuer.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Where the RSA private key comes from.
    pub private_key: PrivateKeySource,
    /// Passphrase for an encrypted private key.
    pub passphrase: Option<Vec<u8>>,
    /// Public key id, sent as the `kid` header.
    pub key_id: String,
    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,
    /// Device name reported to the token endpoint.
    pub device_name: Option<String>,
    /// Enterprise to authenticate as in instance mode.
    pub enterprise_id: Option<EnterpriseId>,
    /// User to authenticate as in user mode.
    pub user: Option<UserIdentifier>,
    /// Endpoint settings.
    pub api: ApiConfig,
}

impl fmt::Debug for JwtAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[redacted]"))
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("device_name", &self.device_name)
            .field("enterprise_id", &self.enterprise_id)
            .field("user", &self.user)
            .field("api", &self.api)
            .finish()
    }
}

impl JwtAuthConfig {
    /// Create a configuration with the required credentials and defaults
    /// for everything else.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        private_key: PrivateKeySource,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            private_key,
            passphrase: None,
            key_id: key_id.into(),
            algorithm: SigningAlgorithm::default(),
            device_name: None,
            enterprise_id: None,
            user: None,
            api: ApiConfig::default(),
        }
    }

    /// Set the private key passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<Vec<u8>>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Set the signing algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the device name.
    #[must_use]
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Set the enterprise used for instance authentication.
    #[must_use]
    pub fn with_enterprise_id(mut self, enterprise_id: EnterpriseId) -> Self {
        self.enterprise_id = Some(enterprise_id);
        self
    }

    /// Set the initial user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<UserIdentifier>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the endpoint configuration.
    #[must_use]
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Build a configuration from an app settings JSON document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the document is not valid JSON, lacks
    /// a required field, or names an empty enterprise id.
    pub fn from_app_settings(json: &str) -> Result<Self> {
        let settings: AppSettings =
            serde_json::from_str(json).map_err(|e| AuthError::Config(e.to_string()))?;

        let app = settings.box_app_settings;
        let mut config = Self::new(
            app.client_id,
            app.client_secret,
            PrivateKeySource::Pem(app.app_auth.private_key.into_bytes()),
            app.app_auth.public_key_id,
        );

        if let Some(passphrase) = app.app_auth.passphrase.filter(|p| !p.is_empty()) {
            config.passphrase = Some(passphrase.into_bytes());
        }

        if let Some(enterprise_id) = settings.enterprise_id {
            let enterprise_id = EnterpriseId::new(enterprise_id)
                .map_err(|e| AuthError::Config(format!("enterpriseID: {e}")))?;
            config.enterprise_id = Some(enterprise_id);
        }

        Ok(config)
    }

    /// Build a configuration from an app settings file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the file cannot be read or parsed.
    pub fn from_app_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("{}: {e}", path.display())))?;
        Self::from_app_settings(&json)
    }

    /// Path of the private key, if it is loaded from disk.
    #[must_use]
    pub fn private_key_path(&self) -> Option<&PathBuf> {
        match &self.private_key {
            PrivateKeySource::Path(path) => Some(path),
            PrivateKeySource::Pem(_) => None,
        }
    }
}

/// Developer console settings document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    box_app_settings: BoxAppSettings,
    #[serde(rename = "enterpriseID", default)]
    enterprise_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxAppSettings {
    #[serde(rename = "clientID")]
    client_id: String,
    client_secret: String,
    app_auth: AppAuth,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppAuth {
    #[serde(rename = "publicKeyID")]
    public_key_id: String,
    private_key: String,
    #[serde(default)]
    passphrase: Option<String>,
}
