//! Command dispatch infrastructure
//!
//! This module handles:
//! - Pre-flight checks on the target device and operator signature
//! - Replay protection through the signature skew window
//! - Driving each attempt through the dispatch state machine
//! - Audit trails, manifests and the command history

pub mod audit;
mod dispatcher;
pub mod history;

pub use audit::AuditTrailBuilder;
pub use dispatcher::{CommandDispatcher, DispatchContext};
pub use history::{CommandHistory, HistoryFilter};
