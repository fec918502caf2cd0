//! reqwest-backed transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{Method, Operation, Transport, TransportReply};
use crate::error::{AuthnError, Result};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Whole-request timeout, surfaced as a transport error on expiry.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("authn-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Single-shot HTTPS transport. Retries are the caller's decision.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpTransportConfig::default())
    }

    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .https_only(true)
            .build()
            .map_err(|e| AuthnError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, payload), fields(href = %operation.href))]
    async fn submit(
        &self,
        operation: &Operation,
        payload: Option<&Value>,
    ) -> Result<TransportReply> {
        let start = Instant::now();

        let mut request = match operation.method {
            Method::Get => self.client.get(&operation.href),
            Method::Post => self.client.post(&operation.href),
            Method::Delete => self.client.delete(&operation.href),
        }
        .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        // The API replies with an empty body on a few endpoints (cancel).
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                AuthnError::Transport(format!("response body is not JSON: {e}"))
            })?
        };

        debug!(
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "authn request completed"
        );

        Ok(TransportReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("authn-core/"));
    }

    #[test]
    fn transport_builds_with_default_config() {
        assert!(HttpTransport::new().is_ok());
    }
}
