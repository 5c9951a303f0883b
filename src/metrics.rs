//! In-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Adapter counters; recording is a no-op while disabled
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    enabled: AtomicBool,
    telemetry_accepted: AtomicU64,
    telemetry_failed: AtomicU64,
    commands_succeeded: AtomicU64,
    commands_failed: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub telemetry_accepted: u64,
    pub telemetry_failed: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
}

impl AdapterMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.is_enabled() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn telemetry_accepted(&self) {
        self.bump(&self.telemetry_accepted);
    }

    pub fn telemetry_failed(&self) {
        self.bump(&self.telemetry_failed);
    }

    pub fn command_succeeded(&self) {
        self.bump(&self.commands_succeeded);
    }

    pub fn command_failed(&self) {
        self.bump(&self.commands_failed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            telemetry_accepted: self.telemetry_accepted.load(Ordering::Relaxed),
            telemetry_failed: self.telemetry_failed.load(Ordering::Relaxed),
            commands_succeeded: self.commands_succeeded.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
        }
    }

    /// Log the counters, if enabled
    pub fn log_summary(&self) {
        if !self.is_enabled() {
            return;
        }
        let s = self.snapshot();
        info!(
            "Metrics: telemetry accepted={} failed={}, commands succeeded={} failed={}",
            s.telemetry_accepted, s.telemetry_failed, s.commands_succeeded, s.commands_failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_stay_zero() {
        let metrics = AdapterMetrics::new(false);
        metrics.telemetry_accepted();
        metrics.command_failed();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_enabled_metrics_count() {
        let metrics = AdapterMetrics::new(true);
        metrics.telemetry_accepted();
        metrics.telemetry_accepted();
        metrics.command_succeeded();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.telemetry_accepted, 2);
        assert_eq!(snapshot.commands_succeeded, 1);
        assert_eq!(snapshot.commands_failed, 0);
    }
}
