//! Transport trait abstraction for the platform endpoint

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// Raw reply from the platform
#[derive(Debug, Clone)]
pub struct PlatformResponse {
    pub status: u16,
    pub body: Bytes,
}

impl PlatformResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single outbound channel to the platform
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// POST a JSON body to `path`, relative to the platform base URL
    async fn post(&self, path: &str, body: Bytes) -> Result<PlatformResponse, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
