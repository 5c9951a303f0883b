//! Append-only audit trail scoped to one command attempt

use crate::clock::Clock;
use instrument_shared::codec::CodecError;
use instrument_shared::{AuditEvent, AuditEventKind};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Turn a `json!({...})` object into audit details
pub fn details(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Records what happened during dispatch, in call order
///
/// Events are stamped when they are appended, so the trail is the
/// authoritative ordering rather than a reconstruction.
pub struct AuditTrailBuilder {
    events: Vec<AuditEvent>,
    clock: Arc<dyn Clock>,
}

impl AuditTrailBuilder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Vec::new(),
            clock,
        }
    }

    /// Append an event stamped with the current time
    pub fn add_event(
        &mut self,
        event: AuditEventKind,
        details: Option<Map<String, Value>>,
        actor_id: Option<&str>,
    ) -> &mut Self {
        self.events.push(AuditEvent {
            event,
            timestamp: self.clock.now(),
            details,
            actor_id: actor_id.map(str::to_string),
        });
        self
    }

    /// Copy of the events recorded so far
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.clone()
    }

    /// Check whether an event of `kind` was recorded
    pub fn contains(&self, kind: AuditEventKind) -> bool {
        self.events.iter().any(|e| e.event == kind)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pretty JSON rendering of the trail
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn test_events_in_call_order() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let mut trail = AuditTrailBuilder::new(clock.clone());

        trail.add_event(AuditEventKind::CommandQueued, None, Some("FERM-001"));
        clock.advance(Duration::milliseconds(5));
        trail
            .add_event(
                AuditEventKind::OperatorSignatureCaptured,
                details(json!({ "operatorId": "OP-001", "algorithm": "RSA-PSS-SHA256" })),
                Some("OP-001"),
            )
            .add_event(AuditEventKind::CommandFailed, None, None);

        let events = trail.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, AuditEventKind::CommandQueued);
        assert_eq!(events[2].event, AuditEventKind::CommandFailed);
        assert!(events[1].timestamp > events[0].timestamp);
        assert_eq!(events[1].details.as_ref().unwrap()["algorithm"], "RSA-PSS-SHA256");
        assert!(trail.contains(AuditEventKind::OperatorSignatureCaptured));
    }

    #[test]
    fn test_events_returns_copy() {
        let mut trail = AuditTrailBuilder::new(Arc::new(FixedClock::new(Utc::now())));
        trail.add_event(AuditEventKind::CommandQueued, None, None);

        let mut copy = trail.events();
        copy.clear();
        assert_eq!(trail.len(), 1);

        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn test_to_json() {
        let mut trail = AuditTrailBuilder::new(Arc::new(FixedClock::new(Utc::now())));
        trail.add_event(AuditEventKind::ManifestGenerated, None, None);
        let json = trail.to_json().unwrap();
        assert!(json.contains("manifest_generated"));
    }

    #[test]
    fn test_details_ignores_non_objects() {
        assert!(details(json!([1, 2])).is_none());
        assert!(details(json!({ "a": 1 })).is_some());
    }
}
