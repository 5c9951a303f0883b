//! Per-device record: immutable metadata plus independently locked live state

use chrono::{DateTime, Utc};
use instrument_shared::{DeviceMetadata, DeviceStatus, TelemetryStream};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// One registered instrument
///
/// Status mutations from different devices never contend; two commands on
/// the same device serialize on `status`.
#[derive(Debug)]
pub struct DeviceEntry {
    metadata: DeviceMetadata,
    status: Mutex<DeviceStatus>,
    streams: RwLock<HashMap<String, TelemetryStream>>,
}

impl DeviceEntry {
    pub(crate) fn new(metadata: DeviceMetadata, now: DateTime<Utc>) -> Self {
        let status = DeviceStatus::registered(metadata.device_id.clone(), now);
        Self {
            metadata,
            status: Mutex::new(status),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.metadata.device_id
    }

    pub fn metadata(&self) -> &DeviceMetadata {
        &self.metadata
    }

    /// Copy of the status with uptime computed against `now`
    pub async fn snapshot(&self, now: DateTime<Utc>) -> DeviceStatus {
        let mut status = self.status.lock().await.clone();
        status.uptime_ms = (now - status.registered_at)
            .num_milliseconds()
            .max(0) as u64;
        status
    }

    /// Mark the device online after the platform accepted a reading
    pub async fn record_telemetry(&self, at: DateTime<Utc>) {
        let mut status = self.status.lock().await;
        status.is_online = true;
        status.last_telemetry = at;
    }

    /// Track a command that has entered dispatch
    pub async fn begin_operation(&self, command_id: &str) {
        let mut status = self.status.lock().await;
        status.active_operations.insert(command_id.to_string());
    }

    /// Release a command that reached a terminal state
    pub async fn finish_operation(&self, command_id: &str, failed: bool) {
        let mut status = self.status.lock().await;
        status.active_operations.remove(command_id);
        if failed {
            status.error_count = status.error_count.saturating_add(1);
        }
    }

    pub(crate) async fn set_stream(&self, stream: TelemetryStream) {
        let mut streams = self.streams.write().await;
        streams.insert(stream.stream_name.clone(), stream);
    }

    /// Definition of a stream, if one was declared
    pub async fn stream(&self, stream_name: &str) -> Option<TelemetryStream> {
        self.streams.read().await.get(stream_name).cloned()
    }
}
