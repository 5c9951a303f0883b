//! Error types for the adapter

use instrument_shared::codec::CodecError;
use instrument_shared::ValidationError;
use thiserror::Error;

/// Failures reaching the platform endpoint
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid platform URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A manifest no longer matches the command it commits to
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Manifest {manifest_id} failed integrity check: recorded hash {recorded}, recomputed {recomputed}")]
    HashMismatch {
        manifest_id: String,
        recorded: String,
        recomputed: String,
    },

    #[error("Manifest {manifest_id} could not be re-hashed: {reason}")]
    Unhashable { manifest_id: String, reason: String },
}

/// Errors surfaced by adapter operations
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Device not registered: {0}")]
    NotRegistered(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Operator signature timestamp is too old (potential replay attack): {skew_ms} ms exceeds {max_skew_ms} ms")]
    StaleSignature { skew_ms: u64, max_skew_ms: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AdapterError {
    /// Check if the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AdapterError::NotRegistered("SORTER-999".into());
        assert_eq!(err.to_string(), "Device not registered: SORTER-999");

        let err = AdapterError::StaleSignature {
            skew_ms: 600_000,
            max_skew_ms: 60_000,
        };
        assert!(err.to_string().contains("too old"));
        assert!(!err.is_retryable());

        let err = AdapterError::from(TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Platform returned HTTP 503: unavailable");
    }
}
