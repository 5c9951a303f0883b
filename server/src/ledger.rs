//! In-memory ledger of everything the platform accepted

use chrono::{DateTime, Utc};
use instrument_shared::{CommandEnvelope, TelemetryEnvelope};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An accepted telemetry reading
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub record_id: String,
    pub received_at: DateTime<Utc>,
    pub envelope: TelemetryEnvelope,
}

/// An acknowledged command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub command_id: String,
    pub acknowledged_at: DateTime<Utc>,
    pub envelope: CommandEnvelope,
}

#[derive(Default)]
struct DeviceLedger {
    telemetry: Vec<TelemetryRecord>,
    commands: Vec<CommandRecord>,
}

/// Accepted records, grouped per device
#[derive(Clone, Default)]
pub struct Ledger {
    /// Map of device_id -> records
    devices: Arc<RwLock<HashMap<String, DeviceLedger>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading and return its record id
    pub async fn record_telemetry(&self, envelope: TelemetryEnvelope) -> TelemetryRecord {
        let record = TelemetryRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            envelope,
        };

        let mut devices = self.devices.write().await;
        devices
            .entry(record.envelope.device_id.clone())
            .or_default()
            .telemetry
            .push(record.clone());
        record
    }

    pub async fn record_command(&self, envelope: CommandEnvelope) -> CommandRecord {
        let record = CommandRecord {
            command_id: envelope.command_id.clone(),
            acknowledged_at: Utc::now(),
            envelope,
        };

        let mut devices = self.devices.write().await;
        devices
            .entry(record.envelope.device_id.clone())
            .or_default()
            .commands
            .push(record.clone());
        record
    }

    pub async fn telemetry_for(&self, device_id: &str) -> Vec<TelemetryRecord> {
        let devices = self.devices.read().await;
        devices
            .get(device_id)
            .map(|d| d.telemetry.clone())
            .unwrap_or_default()
    }

    pub async fn commands_for(&self, device_id: &str) -> Vec<CommandRecord> {
        let devices = self.devices.read().await;
        devices
            .get(device_id)
            .map(|d| d.commands.clone())
            .unwrap_or_default()
    }

    /// Devices that have sent anything, sorted
    pub async fn known_devices(&self) -> Vec<String> {
        let devices = self.devices.read().await;
        let mut ids: Vec<String> = devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total (telemetry, command) record counts
    pub async fn totals(&self) -> (usize, usize) {
        let devices = self.devices.read().await;
        devices.values().fold((0, 0), |(t, c), d| {
            (t + d.telemetry.len(), c + d.commands.len())
        })
    }
}
