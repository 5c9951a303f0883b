//! Device registry for tracking all known instruments

use super::device::DeviceEntry;
use crate::clock::Clock;
use crate::error::AdapterError;
use instrument_shared::{DeviceMetadata, DeviceStatus, TelemetryStream, Validate, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// In-memory store of device metadata and live status
///
/// The map lock is held only to look up or insert entries; status updates
/// go through the entry's own lock.
pub struct DeviceRegistry {
    /// Map of device_id -> entry
    devices: Arc<RwLock<HashMap<String, Arc<DeviceEntry>>>>,
    clock: Arc<dyn Clock>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Validate and register a device, returning its initial status
    ///
    /// A device id can be registered once; re-registration is rejected so
    /// that live status and error history are never silently reset.
    pub async fn register(&self, metadata: DeviceMetadata) -> Result<DeviceStatus, AdapterError> {
        metadata.validate()?;

        let device_id = metadata.device_id.clone();
        let now = self.clock.now();
        let entry = Arc::new(DeviceEntry::new(metadata, now));

        {
            let mut devices = self.devices.write().await;
            if devices.contains_key(&device_id) {
                warn!("Rejected duplicate registration of {}", device_id);
                return Err(AdapterError::AlreadyRegistered(device_id));
            }
            devices.insert(device_id.clone(), entry.clone());
        }

        info!(
            "Device registered: {} ({} {})",
            device_id,
            entry.metadata().vendor_name,
            entry.metadata().model_number
        );
        Ok(entry.snapshot(now).await)
    }

    /// Metadata of every registered device, ordered by id
    pub async fn list(&self) -> Vec<DeviceMetadata> {
        let devices = self.devices.read().await;
        let mut list: Vec<DeviceMetadata> =
            devices.values().map(|e| e.metadata().clone()).collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        list
    }

    /// Current status of a device
    pub async fn status(&self, device_id: &str) -> Result<DeviceStatus, AdapterError> {
        let entry = self
            .get(device_id)
            .await
            .ok_or_else(|| AdapterError::NotFound(device_id.to_string()))?;
        Ok(entry.snapshot(self.clock.now()).await)
    }

    /// Get the entry for a device
    pub async fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        let devices = self.devices.read().await;
        devices.get(device_id).cloned()
    }

    /// Get the entry for a device that must already be registered
    pub async fn require(&self, device_id: &str) -> Result<Arc<DeviceEntry>, AdapterError> {
        self.get(device_id)
            .await
            .ok_or_else(|| AdapterError::NotRegistered(device_id.to_string()))
    }

    /// Declare the shape of one of a device's telemetry streams
    pub async fn define_stream(
        &self,
        device_id: &str,
        stream: TelemetryStream,
    ) -> Result<(), AdapterError> {
        let entry = self.require(device_id).await?;
        stream.validate()?;

        if !entry.metadata().telemetry_streams.contains(&stream.stream_name) {
            return Err(ValidationError::single(
                "TelemetryStream",
                format!(
                    "streamName: {} is not a telemetry stream of {}",
                    stream.stream_name, device_id
                ),
            )
            .into());
        }

        info!("Stream defined: {}/{}", device_id, stream.stream_name);
        entry.set_stream(stream).await;
        Ok(())
    }

    /// Definition of a stream, if the device declared one
    pub async fn stream_definition(&self, device_id: &str, stream_name: &str) -> Option<TelemetryStream> {
        match self.get(device_id).await {
            Some(entry) => entry.stream(stream_name).await,
            None => None,
        }
    }

    pub async fn contains(&self, device_id: &str) -> bool {
        self.devices.read().await.contains_key(device_id)
    }

    /// Get the number of registered devices
    pub async fn count(&self) -> usize {
        self.devices.read().await.len()
    }
}
