//! Synthetic telemetry for a registered device
//!
//! Each tick pushes one reading per declared stream through the normal
//! telemetry path. Commands are never sent: a run has no operator to sign them.

use crate::adapter::InstrumentAdapter;
use crate::error::AdapterError;
use chrono::Utc;
use futures::future::join_all;
use instrument_shared::{
    format_duration, AllowedValue, FailureMode, SimulationConfig, StreamDataType,
    TelemetryPayload, TelemetryStream, TelemetryValue, Validate,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Map};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Range used for numeric streams without declared bounds
const DEFAULT_RANGE: (f64, f64) = (0.0, 100.0);

/// Fraction of the stream range added to every reading per tick under `sensor_drift`
const DRIFT_PER_TICK: f64 = 0.02;

/// Outcome of a simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub device_id: String,
    pub failure_mode: FailureMode,
    pub ticks: u64,
    pub readings_sent: u64,
    pub readings_failed: u64,
    pub readings_skipped: u64,
    pub elapsed_ms: u64,
}

/// Drive `device_id` with synthetic telemetry until `config.duration` elapses
pub async fn run(
    adapter: &InstrumentAdapter,
    device_id: &str,
    config: SimulationConfig,
) -> Result<SimulationReport, AdapterError> {
    config.validate()?;
    let metadata = adapter.device_metadata(device_id).await?;

    let mut streams = Vec::with_capacity(metadata.telemetry_streams.len());
    for name in &metadata.telemetry_streams {
        let definition = adapter.stream_definition(device_id, name).await;
        streams.push((name.clone(), definition));
    }

    let mode = config.failure_mode.unwrap_or_default();
    let rate = config.failure_rate.unwrap_or(0.0);
    if mode == FailureMode::CommandRejected {
        warn!("Failure mode command_rejected has no effect on telemetry-only runs");
    }

    info!(
        "Simulating {} for {} ({} streams every {} ms, mode {:?})",
        device_id,
        format_duration(config.duration),
        streams.len(),
        config.telemetry_interval,
        mode
    );

    let mut rng = StdRng::from_entropy();
    let mut report = SimulationReport {
        device_id: device_id.to_string(),
        failure_mode: mode,
        ..Default::default()
    };

    let started = Instant::now();
    let deadline = started + Duration::from_millis(config.duration);
    let mut ticker = interval(Duration::from_millis(config.telemetry_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if Instant::now() >= deadline {
            break;
        }
        report.ticks += 1;

        if mode == FailureMode::CommunicationTimeout && rng.gen_bool(rate) {
            warn!("[SIM] Tick {} dropped: simulated communication timeout", report.ticks);
            report.readings_skipped += streams.len() as u64;
            continue;
        }

        let drift_steps = match mode {
            FailureMode::SensorDrift => report.ticks as f64,
            _ => 0.0,
        };

        let pushes = streams.iter().map(|(name, definition)| {
            let payload = synthetic_reading(&mut rng, definition.as_ref(), drift_steps);
            async move {
                (
                    name.as_str(),
                    adapter.push_telemetry(device_id, name, payload).await,
                )
            }
        });

        for (name, result) in join_all(pushes).await {
            match result {
                Ok(response) => {
                    debug!("[SIM] {}/{} -> {}", device_id, name, response.record_id);
                    report.readings_sent += 1;
                }
                Err(e) => {
                    warn!("[SIM] {}/{} failed: {}", device_id, name, e);
                    report.readings_failed += 1;
                }
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        "Simulation of {} finished: {} ticks, {} sent, {} failed, {} skipped",
        device_id, report.ticks, report.readings_sent, report.readings_failed, report.readings_skipped
    );

    Ok(report)
}

fn synthetic_reading(
    rng: &mut StdRng,
    definition: Option<&TelemetryStream>,
    drift_steps: f64,
) -> TelemetryPayload {
    let value = match definition {
        None => numeric(rng, DEFAULT_RANGE, drift_steps),
        Some(stream) => match stream.data_type {
            StreamDataType::Numeric => {
                let range = (
                    stream.min_value.unwrap_or(DEFAULT_RANGE.0),
                    stream.max_value.unwrap_or(DEFAULT_RANGE.1),
                );
                numeric(rng, range, drift_steps)
            }
            StreamDataType::Boolean => TelemetryValue::Flag(rng.gen_bool(0.5)),
            StreamDataType::String => match stream.allowed_values.as_deref() {
                Some(allowed) if !allowed.is_empty() => {
                    match &allowed[rng.gen_range(0..allowed.len())] {
                        AllowedValue::Text(text) => TelemetryValue::Text(text.clone()),
                        AllowedValue::Number(n) => TelemetryValue::Text(n.to_string()),
                    }
                }
                _ => TelemetryValue::Text(format!("sample-{}", rng.gen_range(0..1000))),
            },
            StreamDataType::Json => {
                let mut map = Map::new();
                map.insert("sample".into(), json!(rng.gen_range(0.0..1.0)));
                TelemetryValue::Structured(map)
            }
        },
    };

    TelemetryPayload {
        value,
        unit: definition.and_then(|s| s.unit.clone()),
        timestamp: Utc::now(),
        sensor_id: Some("simulator".into()),
        confidence: Some(rng.gen_range(0.9..=1.0)),
        derived_from: Vec::new(),
        metadata: None,
    }
}

fn numeric(rng: &mut StdRng, (min, max): (f64, f64), drift_steps: f64) -> TelemetryValue {
    let (min, max) = if (max - min).is_finite() {
        (min, max)
    } else {
        DEFAULT_RANGE
    };
    let span = (max - min).max(0.0);
    let base = if span > 0.0 {
        rng.gen_range(min..max)
    } else {
        min
    };
    TelemetryValue::Numeric(base + span * DRIFT_PER_TICK * drift_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;
    use crate::connection::retry::RecordingSleeper;
    use crate::transport::mock::ScriptedTransport;
    use instrument_shared::DeviceMetadata;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    async fn adapter_with_device() -> InstrumentAdapter {
        let config = AdapterConfig::new(
            "https://platform.example.com",
            "test-api-key-1234567890",
            "OP-SIM",
        );
        let adapter = InstrumentAdapter::builder(config)
            .transport(Arc::new(ScriptedTransport::accepting()))
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build()
            .unwrap();

        adapter
            .register_device(DeviceMetadata {
                device_id: "BIOREACTOR-001".into(),
                vendor_name: "Sartorius".into(),
                model_number: "Biostat STR".into(),
                serial_number: "BR-2024-0042".into(),
                capabilities: BTreeSet::from(["culture".to_string()]),
                telemetry_streams: BTreeSet::from(["ph".to_string(), "temperature".to_string()]),
                command_types: None,
                location: None,
                maintenance_window: None,
            })
            .await
            .unwrap();
        adapter
            .define_stream(
                "BIOREACTOR-001",
                TelemetryStream {
                    stream_name: "temperature".into(),
                    data_type: StreamDataType::Numeric,
                    unit: Some("C".into()),
                    min_value: Some(30.0),
                    max_value: Some(40.0),
                    allowed_values: None,
                },
            )
            .await
            .unwrap();
        adapter
    }

    fn config(duration: u64, mode: Option<FailureMode>, rate: Option<f64>) -> SimulationConfig {
        SimulationConfig {
            duration,
            telemetry_interval: 100,
            failure_mode: mode,
            failure_rate: rate,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_run_pushes_every_stream() {
        let adapter = adapter_with_device().await;
        let report = adapter
            .run_simulation("BIOREACTOR-001", config(1000, None, None))
            .await
            .unwrap();

        assert!((9..=10).contains(&report.ticks));
        assert_eq!(report.readings_sent, report.ticks * 2);
        assert_eq!(report.readings_failed, 0);
        assert!(adapter.command_history().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_communication_timeout_skips_ticks() {
        let adapter = adapter_with_device().await;
        let report = adapter
            .run_simulation(
                "BIOREACTOR-001",
                config(1000, Some(FailureMode::CommunicationTimeout), Some(1.0)),
            )
            .await
            .unwrap();

        assert!(report.ticks > 0);
        assert_eq!(report.readings_sent, 0);
        assert_eq!(report.readings_skipped, report.ticks * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_drift_leaves_declared_range() {
        let adapter = adapter_with_device().await;
        let report = adapter
            .run_simulation(
                "BIOREACTOR-001",
                config(10_000, Some(FailureMode::SensorDrift), None),
            )
            .await
            .unwrap();

        // Readings drift past maxValue and are rejected, but the run continues
        assert!(report.readings_failed > 0);
        assert!(report.readings_sent > 0);
        assert_eq!(report.readings_sent + report.readings_failed, report.ticks * 2);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let adapter = adapter_with_device().await;
        let err = adapter
            .run_simulation("BIOREACTOR-001", config(500, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_device_rejected() {
        let adapter = adapter_with_device().await;
        let err = adapter
            .run_simulation("MISSING-001", config(1000, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotRegistered(_)));
    }

    #[test]
    fn test_synthetic_values_follow_definition() {
        let mut rng = StdRng::seed_from_u64(7);
        let stream = TelemetryStream {
            stream_name: "state".into(),
            data_type: StreamDataType::String,
            unit: None,
            min_value: None,
            max_value: None,
            allowed_values: Some(vec![
                AllowedValue::Text("idle".into()),
                AllowedValue::Text("running".into()),
            ]),
        };
        for _ in 0..20 {
            match synthetic_reading(&mut rng, Some(&stream), 0.0).value {
                TelemetryValue::Text(t) => assert!(t == "idle" || t == "running"),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn test_unbounded_range_falls_back() {
        let mut rng = StdRng::seed_from_u64(11);
        let stream = TelemetryStream {
            stream_name: "pressure".into(),
            data_type: StreamDataType::Numeric,
            unit: None,
            min_value: Some(-1e308),
            max_value: Some(1e308),
            allowed_values: None,
        };
        for _ in 0..20 {
            match synthetic_reading(&mut rng, Some(&stream), 3.0).value {
                TelemetryValue::Numeric(v) => assert!(v.is_finite() && v >= DEFAULT_RANGE.0),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }
}
