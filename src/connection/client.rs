//! Platform client: JSON encoding, retries and reply parsing over a transport

use crate::connection::retry::{retry, RetryPolicy, Sleeper};
use crate::error::TransportError;
use crate::transport::{PlatformResponse, PlatformTransport};
use bytes::Bytes;
use instrument_shared::codec;
use instrument_shared::{CommandAck, CommandEnvelope, PlatformReply, TelemetryEnvelope};
use std::sync::Arc;
use tracing::{debug, error};

/// Telemetry ingestion endpoint
pub const TELEMETRY_INGEST_PATH: &str = "/api/telemetry/ingest";

/// Command execution endpoint
pub const COMMAND_EXECUTE_PATH: &str = "/api/commands/execute";

/// Sends adapter traffic to the platform, retrying every failure
pub struct PlatformClient {
    transport: Arc<dyn PlatformTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl PlatformClient {
    /// Create a new client
    pub fn new(
        transport: Arc<dyn PlatformTransport>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Forward one telemetry reading
    pub async fn ingest_telemetry(&self, envelope: &TelemetryEnvelope) -> Result<(), TransportError> {
        let body = codec::encode_json(envelope)?;
        self.post_with_retry(TELEMETRY_INGEST_PATH, body).await?;
        debug!(
            "Telemetry accepted: {}/{}",
            envelope.device_id, envelope.stream_name
        );
        Ok(())
    }

    /// Transmit a command and return the platform's acknowledgement
    ///
    /// The reply body is parsed leniently: a missing or malformed `data`
    /// object yields an empty acknowledgement rather than an error.
    pub async fn execute_command(&self, envelope: &CommandEnvelope) -> Result<CommandAck, TransportError> {
        let body = codec::encode_json(envelope)?;
        let response = self.post_with_retry(COMMAND_EXECUTE_PATH, body).await?;

        let reply: PlatformReply = codec::decode_json(&response.body).unwrap_or_default();
        Ok(reply.data.unwrap_or_default())
    }

    async fn post_with_retry(&self, path: &'static str, body: Bytes) -> Result<PlatformResponse, TransportError> {
        let transport = &self.transport;

        let result = retry(&self.policy, self.sleeper.as_ref(), move || {
            let body = body.clone();
            async move {
                let response = transport.post(path, body).await?;
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(TransportError::Status {
                        status: response.status,
                        body: error_body(&response.body),
                    })
                }
            }
        })
        .await;

        if let Err(e) = &result {
            error!(
                "{} {} failed after {} attempts: {}",
                self.transport.name(),
                path,
                self.policy.max_attempts,
                e
            );
        }
        result
    }
}

/// Characters of a rejected response body kept in the error
pub const MAX_ERROR_BODY_CHARS: usize = 512;

fn error_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::retry::RecordingSleeper;
    use crate::transport::mock::ScriptedTransport;
    use chrono::Utc;
    use instrument_shared::{SignatureSummary, TelemetryPayload, TelemetryValue};
    use serde_json::Map;
    use std::time::Duration;

    fn client(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> PlatformClient {
        PlatformClient::new(
            transport,
            sleeper,
            RetryPolicy::new(3, Duration::from_millis(1000)),
        )
    }

    fn telemetry() -> TelemetryEnvelope {
        TelemetryEnvelope {
            device_id: "SORTER-001".into(),
            stream_name: "purity".into(),
            payload: TelemetryPayload {
                value: TelemetryValue::Numeric(92.3),
                unit: Some("%".into()),
                timestamp: Utc::now(),
                sensor_id: None,
                confidence: None,
                derived_from: vec![],
                metadata: None,
            },
            timestamp: Utc::now(),
        }
    }

    fn command() -> CommandEnvelope {
        CommandEnvelope {
            command_id: "cmd-1".into(),
            device_id: "SORTER-001".into(),
            command_name: "start_sort".into(),
            params: Map::new(),
            operator_signature: SignatureSummary {
                operator_id: "OP-001".into(),
                operator_name: None,
                timestamp: Utc::now(),
            },
            command_hash: "abc".into(),
        }
    }

    #[tokio::test]
    async fn test_ingest_posts_to_telemetry_path() {
        let transport = Arc::new(ScriptedTransport::accepting());
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(transport.clone(), sleeper);

        client.ingest_telemetry(&telemetry()).await.expect("ingest failed");

        let body = transport.last_body(TELEMETRY_INGEST_PATH).expect("no body");
        assert_eq!(body["deviceId"], "SORTER-001");
        assert_eq!(body["streamName"], "purity");
        assert_eq!(body["payload"]["value"], 92.3);
    }

    #[tokio::test]
    async fn test_non_2xx_is_retried() {
        let transport = Arc::new(
            ScriptedTransport::accepting()
                .then(Ok(PlatformResponse::new(503, "busy")))
                .then_fail_times(1),
        );
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(transport.clone(), sleeper.clone());

        client.ingest_telemetry(&telemetry()).await.expect("ingest failed");
        assert_eq!(transport.call_count(), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let transport = Arc::new(ScriptedTransport::failing(500));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(transport.clone(), sleeper);

        let err = client.ingest_telemetry(&telemetry()).await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 500, .. }));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_command_ack_parsing() {
        let transport = Arc::new(ScriptedTransport::accepting());
        let client = client(transport.clone(), Arc::new(RecordingSleeper::default()));

        let ack = client.execute_command(&command()).await.expect("execute failed");
        assert_eq!(ack.status.as_deref(), Some("ACKNOWLEDGED"));
        assert!(ack.result.is_some());

        let body = transport.last_body(COMMAND_EXECUTE_PATH).expect("no body");
        assert_eq!(body["operatorSignature"]["operatorId"], "OP-001");
        assert!(body["operatorSignature"].get("signature").is_none());
    }

    #[tokio::test]
    async fn test_command_ack_is_lenient() {
        let transport = Arc::new(
            ScriptedTransport::accepting().then(Ok(PlatformResponse::new(200, "not json"))),
        );
        let client = client(transport, Arc::new(RecordingSleeper::default()));

        let ack = client.execute_command(&command()).await.expect("execute failed");
        assert!(ack.status.is_none());
        assert!(ack.result.is_none());
    }

    #[tokio::test]
    async fn test_large_error_body_truncated() {
        let transport = Arc::new(ScriptedTransport::accepting().then(Ok(PlatformResponse::new(
            502,
            "x".repeat(64 * 1024),
        ))));
        let client = PlatformClient::new(
            transport,
            Arc::new(RecordingSleeper::default()),
            RetryPolicy::new(1, Duration::from_millis(1000)),
        );

        let err = client.ingest_telemetry(&telemetry()).await.unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_short_error_body_kept() {
        assert_eq!(error_body(b"busy"), "busy");
    }
}
