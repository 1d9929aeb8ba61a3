//! The network interface used for token requests.
//!
//! Authentication talks to the API only through `NetworkLayer`, so callers
//! can substitute their own transport (with its own retry and timeout
//! policy). `DefaultNetwork` is the `reqwest` implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ApiConfig;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// An outgoing API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Form fields, sent `application/x-www-form-urlencoded`.
    pub data: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Bearer token to attach, if any.
    pub access_token: Option<String>,
}

impl NetworkRequest {
    /// Look up a form field.
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response as seen by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body.
    pub content: String,
}

impl NetworkResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.content)
    }
}

/// A request that produced no response.
#[derive(Debug, Clone, Error)]
#[error("network error: {0}")]
pub struct NetworkError(pub String);

/// Transport for API requests.
#[async_trait]
pub trait NetworkLayer: Send + Sync {
    /// Send `request` and return the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error only when no response was received.
    async fn request(&self, request: NetworkRequest) -> Result<NetworkResponse, NetworkError>;
}

/// `reqwest`-backed network layer.
#[derive(Debug, Clone)]
pub struct DefaultNetwork {
    client: reqwest::Client,
}

impl DefaultNetwork {
    /// Create a network layer with the timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| NetworkError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create a network layer with a custom reqwest client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkLayer for DefaultNetwork {
    async fn request(&self, request: NetworkRequest) -> Result<NetworkResponse, NetworkError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.access_token {
            builder = builder.bearer_auth(token);
        }
        if !request.data.is_empty() {
            builder = builder.form(&request.data);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError(format!("request failed: {e}")))?;

        let status_code = response.status().as_u16();
        let content = response
            .text()
            .await
            .map_err(|e| NetworkError(format!("failed to read response body: {e}")))?;

        Ok(NetworkResponse {
            status_code,
            content,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockNetworkLayer;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{NetworkError, NetworkLayer, NetworkRequest, NetworkResponse};

    /// A network layer that records requests and replays queued responses.
    ///
    /// When the queue is empty every request fails with a `NetworkError`.
    #[derive(Debug, Default)]
    pub struct MockNetworkLayer {
        requests: Mutex<Vec<NetworkRequest>>,
        responses: Mutex<VecDeque<Result<NetworkResponse, NetworkError>>>,
    }

    impl MockNetworkLayer {
        /// Create a mock with no queued responses.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response.
        pub fn push_response(&self, status_code: u16, content: impl Into<String>) {
            self.responses.lock().push_back(Ok(NetworkResponse {
                status_code,
                content: content.into(),
            }));
        }

        /// Queue a 200 response carrying `access_token`.
        pub fn push_token(&self, access_token: &str) {
            let body = serde_json::json!({
                "access_token": access_token,
                "expires_in": 3600,
                "token_type": "bearer",
                "restricted_to": [],
            });
            self.push_response(200, body.to_string());
        }

        /// Queue a transport failure.
        pub fn push_error(&self, message: impl Into<String>) {
            self.responses
                .lock()
                .push_back(Err(NetworkError(message.into())));
        }

        /// Every request received so far.
        #[must_use]
        pub fn requests(&self) -> Vec<NetworkRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl NetworkLayer for MockNetworkLayer {
        async fn request(&self, request: NetworkRequest) -> Result<NetworkResponse, NetworkError> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(NetworkError("no response queued".to_string())))
        }
    }
}
