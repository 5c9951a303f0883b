//! Telemetry ingestion
//!
//! Readings are validated against their payload schema and, when declared,
//! their stream definition before they are forwarded to the platform.

mod pipeline;

pub use pipeline::TelemetryPipeline;
