//! Boundary between the client gate and the decision engine.

use crate::engine::VisitorVerdict;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failures crossing the boundary.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("visitor check request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("visitor check rejected with status {0}")]
    Status(u16),

    #[error("visitor check timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid location: {0}")]
    InvalidLocation(String),
}

/// Something that can answer a visitor check.
#[async_trait]
pub trait VisitorApi: Send + Sync {
    async fn check_visitor(&self, url: &str, client_blacklisted: bool) -> Result<VisitorVerdict, GateError>;
}

/// `GET /api/check-visitor` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVisitorApi {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVisitorApi {
    /// Client for the gate at `base_url` (scheme, host and optional port).
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/check-visitor", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VisitorApi for HttpVisitorApi {
    async fn check_visitor(&self, url: &str, client_blacklisted: bool) -> Result<VisitorVerdict, GateError> {
        let flag = if client_blacklisted { "true" } else { "false" };
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url), ("clientBlacklisted", flag)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Status(status.as_u16()));
        }

        Ok(response.json::<VisitorVerdict>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        assert_eq!(
            HttpVisitorApi::new("http://127.0.0.1:5000/").endpoint(),
            "http://127.0.0.1:5000/api/check-visitor"
        );
        assert_eq!(
            HttpVisitorApi::new("https://gate.example").endpoint(),
            "https://gate.example/api/check-visitor"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let api = HttpVisitorApi::new("http://127.0.0.1:9");
        let err = api.check_visitor("http://127.0.0.1:9/", false).await.unwrap_err();
        assert!(matches!(err, GateError::Transport(_)));
    }
}
