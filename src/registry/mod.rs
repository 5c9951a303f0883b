//! Device registry
//!
//! This module handles:
//! - Validated, once-only device registration
//! - Per-device live status behind its own lock
//! - Telemetry stream definitions

mod device;
mod manager;

pub use device::DeviceEntry;
pub use manager::DeviceRegistry;
