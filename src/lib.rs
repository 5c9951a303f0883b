//! Instrument command & compliance adapter
//!
//! Connects laboratory and manufacturing instruments to a remote platform:
//! devices are registered once, push validated telemetry, and receive
//! operator-signed commands. Every command attempt leaves an audit trail and
//! a hash-committed manifest suitable for 21 CFR Part 11 review.

pub mod adapter;
pub mod clock;
pub mod command;
pub mod compliance;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod simulation;
pub mod telemetry;
pub mod transport;

pub use adapter::{AdapterBuilder, InstrumentAdapter};
pub use config::{AdapterConfig, LogLevel};
pub use error::{AdapterError, IntegrityError, TransportError};
pub use simulation::SimulationReport;
