//! Compliance reporting over command history

use chrono::{DateTime, Utc};
use instrument_shared::{is_within_skew, CommandManifest, CommandResult, CommandStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Aggregate counts over a command history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSummary {
    pub total_commands: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage with two decimals and a trailing `%`
    pub success_rate: String,
}

/// Index entry for one manifest in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub manifest_id: String,
    pub command_id: String,
    pub status: CommandStatus,
    pub timestamp: DateTime<Utc>,
}

/// Report suitable for inclusion in a batch production record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub summary: CommandSummary,
    /// Distinct audit actors in first-seen order
    pub operators_involved: Vec<String>,
    pub manifests: Vec<ManifestEntry>,
}

/// Outcome of a manifest completeness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub compliant: bool,
    pub issues: Vec<String>,
}

/// `successful / total * 100` formatted as `66.67%`; an empty history is `0.00%`
pub fn format_success_rate(successful: usize, total: usize) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", successful as f64 / total as f64 * 100.0)
}

/// Summarize a command history
pub fn generate_command_summary(history: &[CommandResult]) -> ComplianceReport {
    let successful = history
        .iter()
        .filter(|r| r.status == CommandStatus::Success)
        .count();
    let failed = history
        .iter()
        .filter(|r| r.status == CommandStatus::Failure)
        .count();

    let mut seen = HashSet::new();
    let operators_involved = history
        .iter()
        .flat_map(|r| r.audit_trail.iter())
        .filter_map(|e| e.actor_id.as_ref())
        .filter(|actor| seen.insert(actor.as_str()))
        .cloned()
        .collect();

    let manifests = history
        .iter()
        .map(|r| ManifestEntry {
            manifest_id: r.manifest.manifest_id.clone(),
            command_id: r.command_id.clone(),
            status: r.status,
            timestamp: r.manifest.timestamp,
        })
        .collect();

    ComplianceReport {
        summary: CommandSummary {
            total_commands: history.len(),
            successful,
            failed,
            success_rate: format_success_rate(successful, history.len()),
        },
        operators_involved,
        manifests,
    }
}

/// Check a manifest for the fields a Part 11 record must carry
pub fn validate_compliance(
    manifest: &CommandManifest,
    now: DateTime<Utc>,
    max_skew_ms: u64,
) -> ComplianceCheck {
    let mut issues = Vec::new();

    if manifest.manifest_id.is_empty() {
        issues.push("Missing manifest ID".to_string());
    }
    if manifest.operator_id.is_empty() {
        issues.push("Missing operator ID".to_string());
    }
    if manifest.signature.is_empty() {
        issues.push("Missing digital signature".to_string());
    }
    if manifest.command_hash.is_empty() {
        issues.push("Missing command hash".to_string());
    }
    if !is_within_skew(manifest.timestamp, now, max_skew_ms) {
        issues.push("Timestamp outside acceptable range (clock skew detected)".to_string());
    }
    if manifest.audit_trail.is_empty() {
        issues.push("Missing audit trail".to_string());
    }
    if manifest.compliance_frameworks.is_empty() {
        issues.push("No compliance frameworks specified".to_string());
    }

    ComplianceCheck {
        compliant: issues.is_empty(),
        issues,
    }
}
