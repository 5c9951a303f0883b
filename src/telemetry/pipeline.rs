//! Telemetry pipeline
//!
//! validate envelope -> forward with retry -> mark device online. Device status is
//! only touched after the platform confirmed acceptance.

use crate::clock::Clock;
use crate::compliance::ManifestGenerator;
use crate::connection::PlatformClient;
use crate::error::AdapterError;
use crate::metrics::AdapterMetrics;
use crate::registry::DeviceRegistry;
use instrument_shared::validation::validate_telemetry_against_stream;
use instrument_shared::{
    TelemetryEnvelope, TelemetryManifest, TelemetryPayload, TelemetryResponse, Validate,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ingests telemetry for registered devices
pub struct TelemetryPipeline {
    registry: Arc<DeviceRegistry>,
    client: Arc<PlatformClient>,
    manifests: Arc<ManifestGenerator>,
    metrics: Arc<AdapterMetrics>,
    clock: Arc<dyn Clock>,
}

impl TelemetryPipeline {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        client: Arc<PlatformClient>,
        manifests: Arc<ManifestGenerator>,
        metrics: Arc<AdapterMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            client,
            manifests,
            metrics,
            clock,
        }
    }

    /// Validate and forward one reading
    pub async fn push(
        &self,
        device_id: &str,
        stream_name: &str,
        payload: TelemetryPayload,
    ) -> Result<TelemetryResponse, AdapterError> {
        let entry = self.registry.require(device_id).await?;

        let timestamp = self.clock.now();
        let envelope = TelemetryEnvelope {
            device_id: device_id.to_string(),
            stream_name: stream_name.to_string(),
            payload,
            timestamp,
        };
        // Same schema the platform enforces on ingest
        envelope.validate()?;
        if let Some(stream) = entry.stream(stream_name).await {
            validate_telemetry_against_stream(&envelope.payload, &stream)?;
        }

        if let Err(e) = self.client.ingest_telemetry(&envelope).await {
            self.metrics.telemetry_failed();
            warn!("Telemetry for {}/{} rejected: {}", device_id, stream_name, e);
            return Err(e.into());
        }

        entry.record_telemetry(self.clock.now()).await;
        self.metrics.telemetry_accepted();

        let record_id = Uuid::new_v4().to_string();
        debug!("Telemetry {} recorded for {}/{}", record_id, device_id, stream_name);
        Ok(TelemetryResponse::received(record_id, device_id, timestamp))
    }

    /// Compliance record over a batch of readings from one stream
    pub async fn build_batch_manifest(
        &self,
        device_id: &str,
        stream_name: &str,
        payloads: &[TelemetryPayload],
    ) -> Result<TelemetryManifest, AdapterError> {
        self.registry.require(device_id).await?;
        Ok(self
            .manifests
            .telemetry_manifest(device_id, stream_name, payloads)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::connection::retry::RecordingSleeper;
    use crate::connection::{RetryPolicy, TELEMETRY_INGEST_PATH};
    use crate::transport::mock::ScriptedTransport;
    use chrono::Utc;
    use instrument_shared::{DeviceMetadata, StreamDataType, TelemetryStream, TelemetryValue};
    use std::collections::BTreeSet;
    use std::time::Duration;

    struct Fixture {
        pipeline: TelemetryPipeline,
        registry: Arc<DeviceRegistry>,
        transport: Arc<ScriptedTransport>,
        metrics: Arc<AdapterMetrics>,
    }

    fn fixture(transport: ScriptedTransport) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let transport = Arc::new(transport);
        let registry = Arc::new(DeviceRegistry::new(clock.clone()));
        let client = Arc::new(PlatformClient::new(
            transport.clone(),
            Arc::new(RecordingSleeper::default()),
            RetryPolicy::new(3, Duration::from_millis(1000)),
        ));
        let metrics = Arc::new(AdapterMetrics::new(true));
        let pipeline = TelemetryPipeline::new(
            registry.clone(),
            client,
            Arc::new(ManifestGenerator::new(clock.clone())),
            metrics.clone(),
            clock,
        );
        Fixture {
            pipeline,
            registry,
            transport,
            metrics,
        }
    }

    fn sorter() -> DeviceMetadata {
        DeviceMetadata {
            device_id: "SORTER-001".into(),
            vendor_name: "BD Biosciences".into(),
            model_number: "FACSAria".into(),
            serial_number: "SN123456".into(),
            capabilities: BTreeSet::from(["sort".to_string()]),
            telemetry_streams: BTreeSet::from(["purity".to_string()]),
            command_types: None,
            location: None,
            maintenance_window: None,
        }
    }

    fn reading(value: f64) -> TelemetryPayload {
        TelemetryPayload {
            value: TelemetryValue::Numeric(value),
            unit: Some("%".into()),
            timestamp: Utc::now(),
            sensor_id: None,
            confidence: None,
            derived_from: vec![],
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_push_marks_device_online() {
        let f = fixture(ScriptedTransport::accepting());
        f.registry.register(sorter()).await.unwrap();
        let before = f.registry.status("SORTER-001").await.unwrap();

        let response = f
            .pipeline
            .push("SORTER-001", "purity", reading(92.3))
            .await
            .expect("push failed");

        assert!(response.received);
        assert_eq!(response.device_id, "SORTER-001");
        assert!(!response.record_id.is_empty());

        let status = f.registry.status("SORTER-001").await.unwrap();
        assert!(status.is_online);
        assert!(status.last_telemetry >= before.last_telemetry);
        assert_eq!(f.metrics.snapshot().telemetry_accepted, 1);
    }

    #[tokio::test]
    async fn test_unregistered_device_rejected() {
        let f = fixture(ScriptedTransport::accepting());
        let err = f
            .pipeline
            .push("SORTER-999", "purity", reading(92.3))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not registered"));
        assert_eq!(f.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_never_sent() {
        let f = fixture(ScriptedTransport::accepting());
        f.registry.register(sorter()).await.unwrap();

        let mut payload = reading(92.3);
        payload.confidence = Some(3.0);
        let err = f.pipeline.push("SORTER-001", "purity", payload).await.unwrap_err();

        assert!(matches!(err, AdapterError::Validation(_)));
        assert_eq!(f.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_definition_enforced() {
        let f = fixture(ScriptedTransport::accepting());
        f.registry.register(sorter()).await.unwrap();
        f.registry
            .define_stream(
                "SORTER-001",
                TelemetryStream {
                    stream_name: "purity".into(),
                    data_type: StreamDataType::Numeric,
                    unit: Some("%".into()),
                    min_value: Some(0.0),
                    max_value: Some(100.0),
                    allowed_values: None,
                },
            )
            .await
            .unwrap();

        let err = f
            .pipeline
            .push("SORTER-001", "purity", reading(140.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
        assert_eq!(f.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_status_untouched() {
        let f = fixture(ScriptedTransport::failing(503));
        f.registry.register(sorter()).await.unwrap();

        let err = f
            .pipeline
            .push("SORTER-001", "purity", reading(92.3))
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Transport(_)));
        assert_eq!(f.transport.call_count(), 3);
        let status = f.registry.status("SORTER-001").await.unwrap();
        assert!(!status.is_online);
        assert_eq!(f.metrics.snapshot().telemetry_failed, 1);
    }

    #[tokio::test]
    async fn test_forwarded_envelope_shape() {
        let f = fixture(ScriptedTransport::accepting());
        f.registry.register(sorter()).await.unwrap();
        f.pipeline
            .push("SORTER-001", "purity", reading(92.3))
            .await
            .unwrap();

        let body = f.transport.last_body(TELEMETRY_INGEST_PATH).unwrap();
        assert_eq!(body["deviceId"], "SORTER-001");
        assert_eq!(body["payload"]["unit"], "%");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_batch_manifest() {
        let f = fixture(ScriptedTransport::accepting());
        f.registry.register(sorter()).await.unwrap();

        let manifest = f
            .pipeline
            .build_batch_manifest("SORTER-001", "purity", &[reading(92.3), reading(91.0)])
            .await
            .unwrap();
        assert_eq!(manifest.record_count, 2);

        let err = f
            .pipeline
            .build_batch_manifest("SORTER-999", "purity", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_stream_name_outside_platform_schema() {
        let f = fixture(ScriptedTransport::accepting());
        let mut reader = sorter();
        reader.device_id = "READER-001".into();
        reader.telemetry_streams = BTreeSet::from(["OD600".to_string()]);
        f.registry.register(reader).await.unwrap();

        let err = f
            .pipeline
            .push("READER-001", "OD600", reading(0.42))
            .await
            .unwrap_err();

        match err {
            AdapterError::Validation(e) => {
                assert_eq!(e.context, "TelemetryEnvelope");
                assert!(e.violations[0].starts_with("streamName"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(f.transport.call_count(), 0);
        assert_eq!(f.metrics.snapshot().telemetry_failed, 0);
    }
}
