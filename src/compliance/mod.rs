//! Compliance records
//!
//! This module handles:
//! - Hash-committed command manifests and telemetry batch manifests
//! - On-demand integrity verification
//! - Summary reports and manifest completeness checks

pub mod manifest;
pub mod reporter;

pub use manifest::{
    command_result_to_manifest, ensure_integrity, manifest_to_json, new_manifest_id,
    verify_manifest_integrity, ManifestGenerator, ManifestRequest,
};
pub use reporter::{
    format_success_rate, generate_command_summary, validate_compliance, ComplianceCheck,
    ComplianceReport, CommandSummary, ManifestEntry,
};
