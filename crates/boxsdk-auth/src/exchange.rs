//! Exchanging a signed assertion for an access token.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::network::{Method, NetworkLayer, NetworkRequest};

/// OAuth2 grant type for JWT bearer assertions.
pub const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Device id reported with every token request.
pub const DEVICE_ID: &str = "0";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Successful token endpoint response. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the token endpoint.
pub struct TokenExchangeClient {
    client_id: String,
    client_secret: String,
    device_name: Option<String>,
    token_url: String,
    network: Arc<dyn NetworkLayer>,
}

impl TokenExchangeClient {
    /// Create a client posting to `token_url` through `network`.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        device_name: Option<String>,
        token_url: impl Into<String>,
        network: Arc<dyn NetworkLayer>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            device_name,
            token_url: token_url.into(),
            network,
        }
    }

    /// The URL token requests are posted to.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// The form request for `assertion`.
    #[must_use]
    pub fn token_request(&self, assertion: &str) -> NetworkRequest {
        let data = vec![
            ("grant_type".to_string(), JWT_GRANT_TYPE.to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("assertion".to_string(), assertion.to_string()),
            ("box_device_id".to_string(), DEVICE_ID.to_string()),
            (
                "box_device_name".to_string(),
                self.device_name.clone().unwrap_or_default(),
            ),
        ];

        NetworkRequest {
            method: Method::Post,
            url: self.token_url.clone(),
            data,
            headers: vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())],
            access_token: None,
        }
    }

    /// Post `assertion` to the token endpoint and return the access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Authentication` if the request fails, the status
    /// is not 2xx, or the body carries no `access_token`.
    pub async fn exchange(&self, assertion: &str) -> Result<String> {
        tracing::debug!(url = %self.token_url, "Requesting access token");

        let response = self
            .network
            .request(self.token_request(assertion))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Token request failed");
                AuthError::Authentication {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        if !response.ok() {
            tracing::warn!(status = response.status_code, "Token endpoint rejected assertion");
            return Err(AuthError::Authentication {
                status: Some(response.status_code),
                body: response.content,
            });
        }

        match response.json::<TokenResponse>() {
            Ok(token) => {
                tracing::debug!("Access token issued");
                Ok(token.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed token response");
                Err(AuthError::Authentication {
                    status: Some(response.status_code),
                    body: response.content,
                })
            }
        }
    }
}
