//! Connection management for the platform endpoint
//!
//! This module handles:
//! - Exponential-backoff retries with an injectable sleeper
//! - JSON encoding of outbound bodies
//! - Lenient parsing of command acknowledgements

mod client;
pub mod retry;

pub use client::{PlatformClient, COMMAND_EXECUTE_PATH, TELEMETRY_INGEST_PATH};
pub use retry::{retry, RetryPolicy, Sleeper, TokioSleeper};
