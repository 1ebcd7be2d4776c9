//! Gateway HTTP Client
//!
//! The console's view of the execution service. Each call is one HTTP
//! round trip; nothing is retried.

use crate::protocol::{CommandRequest, CommandResult, WelcomeMessage};
use crate::server::EXECUTE_PATH;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Failure to complete a round trip with the execution service
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    /// Connection refused, DNS failure, request timeout and similar
    #[error("Could not reach {url}: {message}")]
    Network { url: String, message: String },

    /// The service answered with a non-success status
    #[error("{url} answered with HTTP status {status}")]
    Status { url: String, status: u16 },

    /// The service answered with a body that is not the expected payload
    #[error("Invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Something that can probe and drive an execution service
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Liveness probe; returns the service's welcome message
    async fn probe(&self) -> Result<WelcomeMessage, ClientError>;

    /// Submit one execution request
    async fn execute(&self, request: &CommandRequest) -> Result<CommandResult, ClientError>;

    /// Human-readable location of the service, used in diagnostics
    fn endpoint(&self) -> &str;
}

/// HTTP implementation of [`Gateway`]
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a client for the service at `base_url`
    ///
    /// `timeout` bounds each HTTP request and should exceed the service's
    /// execution timeout, otherwise slow commands surface as network errors.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Get the service base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &str, error: reqwest::Error) -> ClientError {
    if error.is_decode() {
        ClientError::Decode {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        ClientError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn probe(&self) -> Result<WelcomeMessage, ClientError> {
        let url = format!("{}/", self.base_url);
        debug!("Probing {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        Self::decode(&url, response).await
    }

    async fn execute(&self, request: &CommandRequest) -> Result<CommandResult, ClientError> {
        let url = format!("{}{}", self.base_url, EXECUTE_PATH);
        debug!("Sending execution request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        Self::decode(&url, response).await
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
