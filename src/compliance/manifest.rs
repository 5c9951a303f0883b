//! Manifest generation and integrity verification
//!
//! A command manifest commits to `(deviceId, commandName, paramsSnapshot)`
//! through `commandHash`. Re-hashing the snapshot at any later time must
//! reproduce the recorded hash; anything else means the record was altered.

use crate::clock::Clock;
use crate::error::IntegrityError;
use chrono::{DateTime, Utc};
use instrument_shared::codec::{self, CodecError};
use instrument_shared::frameworks;
use instrument_shared::{
    AuditEvent, CommandManifest, CommandParams, CommandResult, ManifestStatus, OperatorSignature,
    TelemetryManifest,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Fresh manifest id: `MF-YYYYMMDD-XXXXXXXX`
pub fn new_manifest_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "MF-{}-{}",
        now.format("%Y%m%d"),
        suffix[..8].to_ascii_uppercase()
    )
}

/// Everything a command manifest is built from
#[derive(Debug, Clone)]
pub struct ManifestRequest<'a> {
    pub device_id: &'a str,
    pub command_name: &'a str,
    pub params: &'a CommandParams,
    pub signature: &'a OperatorSignature,
    pub status: ManifestStatus,
    pub error: Option<&'a str>,
    pub audit_trail: Vec<AuditEvent>,
}

/// Builds command and telemetry manifests
pub struct ManifestGenerator {
    clock: Arc<dyn Clock>,
}

impl ManifestGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Hash the command and build its manifest
    pub fn command_manifest(&self, request: ManifestRequest<'_>) -> Result<CommandManifest, CodecError> {
        let command_hash =
            codec::command_hash(request.device_id, request.command_name, request.params)?;
        Ok(self.assemble(request, command_hash))
    }

    /// Build a manifest around a hash that has already been committed
    pub fn assemble(&self, request: ManifestRequest<'_>, command_hash: String) -> CommandManifest {
        let now = self.clock.now();
        let signature = request.signature;

        CommandManifest {
            manifest_id: new_manifest_id(now),
            timestamp: now,
            device_id: request.device_id.to_string(),
            command_name: request.command_name.to_string(),
            operator_id: signature.operator_id.clone(),
            operator_name: signature.operator_name.clone().unwrap_or_default(),
            status: request.status,
            command_hash,
            signature_algorithm: signature.signing_algorithm.unwrap_or_default(),
            signature: signature.signature.clone(),
            params_snapshot: request.params.clone(),
            error_details: request.error.map(str::to_string),
            audit_trail: request.audit_trail,
            compliance_frameworks: frameworks::to_vec(&frameworks::COMMAND),
        }
    }

    /// Batch-level record for a run of telemetry readings
    pub fn telemetry_manifest<T: Serialize>(
        &self,
        device_id: &str,
        stream_name: &str,
        records: &[T],
    ) -> Result<TelemetryManifest, CodecError> {
        let now = self.clock.now();
        Ok(TelemetryManifest {
            manifest_id: new_manifest_id(now),
            timestamp: now,
            device_id: device_id.to_string(),
            stream_name: stream_name.to_string(),
            record_count: records.len(),
            batch_hash: codec::batch_hash(records)?,
            compliance_frameworks: frameworks::to_vec(&frameworks::TELEMETRY),
        })
    }
}

/// Recompute the hash from the snapshot and compare
pub fn ensure_integrity(manifest: &CommandManifest) -> Result<(), IntegrityError> {
    let recomputed = codec::command_hash(
        &manifest.device_id,
        &manifest.command_name,
        &manifest.params_snapshot,
    )
    .map_err(|e| IntegrityError::Unhashable {
        manifest_id: manifest.manifest_id.clone(),
        reason: e.to_string(),
    })?;

    if recomputed != manifest.command_hash {
        return Err(IntegrityError::HashMismatch {
            manifest_id: manifest.manifest_id.clone(),
            recorded: manifest.command_hash.clone(),
            recomputed,
        });
    }
    Ok(())
}

/// Check whether a manifest still matches the command it commits to
pub fn verify_manifest_integrity(manifest: &CommandManifest) -> bool {
    ensure_integrity(manifest).is_ok()
}

/// Pretty JSON rendering for inclusion in batch records
pub fn manifest_to_json(manifest: &CommandManifest) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// The manifest carried by a finished command
pub fn command_result_to_manifest(result: &CommandResult) -> &CommandManifest {
    &result.manifest
}
