//! Instrument Adapter Shared Types
//!
//! This crate provides the data model, schema validation, canonical hashing
//! and dispatch state machine shared by the instrument adapter and the
//! platform simulator.

pub mod codec;
pub mod model;
pub mod state_machine;
pub mod validation;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

// Re-export commonly used types at crate root
pub use model::*;
pub use validation::{parse_strict, Validate, ValidationError};

/// Absolute distance between two instants in milliseconds
pub fn skew_ms(a: DateTime<Utc>, b: DateTime<Utc>) -> u64 {
    (a - b).num_milliseconds().unsigned_abs()
}

/// Check that `timestamp` lies within `max_skew_ms` of `now`, in either direction
pub fn is_within_skew(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_skew_ms: u64) -> bool {
    skew_ms(timestamp, now) <= max_skew_ms
}

/// Human-readable duration: `850ms`, `2.5s`, `1.5m`
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}

/// Operational limits for the adapter
pub mod limits {
    /// Maximum age of an operator signature before it is treated as a replay
    pub const MAX_SIGNATURE_SKEW_MS: u64 = 60_000;

    /// Shortest credential blob accepted as a signature
    pub const MIN_SIGNATURE_LENGTH: usize = 100;

    /// Shortest accepted platform API key
    pub const MIN_API_KEY_LENGTH: usize = 20;

    /// Default transport attempts before giving up
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

    /// Bounds on configured transport attempts
    pub const MIN_RETRY_ATTEMPTS: u32 = 1;
    pub const MAX_RETRY_ATTEMPTS: u32 = 10;

    /// Base backoff delay, doubled after every failed attempt
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    /// Bounds on the configured per-request timeout
    pub const MIN_TIMEOUT_MS: u64 = 100;
    pub const MAX_TIMEOUT_MS: u64 = 300_000;
}

/// Compliance framework tags attached to manifests
pub mod frameworks {
    pub const FDA_21_CFR_PART_11: &str = "FDA-21CFR-Part11";
    pub const ICH_Q7: &str = "ICH-Q7";
    pub const ALCOA_PLUS: &str = "ALCOA+";

    /// Frameworks every command manifest asserts
    pub const COMMAND: [&str; 3] = [FDA_21_CFR_PART_11, ICH_Q7, ALCOA_PLUS];

    /// Frameworks every telemetry batch manifest asserts
    pub const TELEMETRY: [&str; 2] = [FDA_21_CFR_PART_11, ALCOA_PLUS];

    /// Owned copy of a tag set, as stored in a manifest
    pub fn to_vec(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|tag| tag.to_string()).collect()
    }
}

/// Builder helpers for audit events
impl AuditEvent {
    /// Create an event with no details or actor
    pub fn new(event: AuditEventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            event,
            timestamp,
            details: None,
            actor_id: None,
        }
    }

    /// Attach a details object
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the id of whoever caused the event
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

impl TelemetryResponse {
    /// Create the response for a reading the platform accepted
    pub fn received(
        record_id: impl Into<String>,
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            device_id: device_id.into(),
            timestamp,
            received: true,
            validation_errors: Vec::new(),
        }
    }
}

impl DeviceStatus {
    /// Fresh status for a newly registered device
    pub fn registered(device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            is_online: false,
            health_score: 0,
            last_telemetry: now,
            active_operations: Default::default(),
            error_count: 0,
            registered_at: now,
            uptime_ms: 0,
        }
    }
}

impl CommandResult {
    /// Check if the command reached its success state
    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_skew_window() {
        let now = Utc::now();
        assert!(is_within_skew(now, now, limits::MAX_SIGNATURE_SKEW_MS));
        assert!(is_within_skew(
            now - Duration::seconds(59),
            now,
            limits::MAX_SIGNATURE_SKEW_MS
        ));
        assert!(!is_within_skew(
            now - Duration::minutes(10),
            now,
            limits::MAX_SIGNATURE_SKEW_MS
        ));
        // Future-dated signatures are bounded as well
        assert!(!is_within_skew(
            now + Duration::minutes(2),
            now,
            limits::MAX_SIGNATURE_SKEW_MS
        ));
    }

    #[test]
    fn test_audit_event_builder() {
        let now = Utc::now();
        let event = AuditEvent::new(AuditEventKind::CommandQueued, now).with_actor("SORTER-001");
        assert_eq!(event.actor_id.as_deref(), Some("SORTER-001"));
        assert!(event.details.is_none());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "command_queued");
        assert_eq!(json["actorId"], "SORTER-001");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_registered_status() {
        let status = DeviceStatus::registered("FERM-001", Utc::now());
        assert!(!status.is_online);
        assert_eq!(status.health_score, 0);
        assert_eq!(status.error_count, 0);
        assert!(status.active_operations.is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(850), "850ms");
        assert_eq!(format_duration(2500), "2.5s");
        assert_eq!(format_duration(90_000), "1.5m");
    }

    #[test]
    fn test_framework_tags() {
        let tags = frameworks::to_vec(&frameworks::COMMAND);
        assert_eq!(tags, vec!["FDA-21CFR-Part11", "ICH-Q7", "ALCOA+"]);
    }
}
