//! HTTP(S) transport implementation

use crate::config::AdapterConfig;
use crate::error::TransportError;
use crate::transport::traits::{PlatformResponse, PlatformTransport};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::debug;

/// `User-Agent` sent with every request
pub const USER_AGENT: &str = concat!("instrument-adapter/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed transport with bearer authentication
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport for the configured platform
    pub fn new(config: &AdapterConfig) -> Result<Self, TransportError> {
        let parsed = Url::parse(&config.platform_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", config.platform_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(config.platform_url.clone()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.platform_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Full URL for a platform path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PlatformTransport for HttpTransport {
    async fn post(&self, path: &str, body: Bytes) -> Result<PlatformResponse, TransportError> {
        let url = self.url_for(path);
        debug!("POST {} ({} bytes)", url, body.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!("POST {} -> {}", url, status);

        Ok(PlatformResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "HTTP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_keeps_base_path() {
        let config = AdapterConfig::new(
            "https://platform.example.com/v1/",
            "test-api-key-1234567890",
            "OP-001",
        );
        let transport = HttpTransport::new(&config).expect("transport");
        assert_eq!(
            transport.url_for("/api/telemetry/ingest"),
            "https://platform.example.com/v1/api/telemetry/ingest"
        );
        assert_eq!(transport.name(), "HTTP");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = AdapterConfig::new("not a url", "test-api-key-1234567890", "OP-001");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("instrument-adapter/"));
    }
}
