//! Data model shared by the adapter and the platform simulator
//!
//! Field names are camelCase on the wire to match the platform's JSON API.
//! Inbound structures reject unknown fields at deserialisation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Free-form command parameters, copied verbatim into manifests
pub type CommandParams = Map<String, Value>;

// ============================================================================
// Devices
// ============================================================================

/// Day of the week for a maintenance window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Recurring window during which the instrument must not receive commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MaintenanceWindow {
    pub day_of_week: DayOfWeek,
    pub start_hour: u8,
    pub end_hour: u8,
}

/// Static description of an instrument, immutable once registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceMetadata {
    pub device_id: String,
    pub vendor_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub capabilities: BTreeSet<String>,
    pub telemetry_streams: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_types: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
}

/// Live status of a registered instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: String,
    pub is_online: bool,
    /// 0-100
    pub health_score: u8,
    pub last_telemetry: DateTime<Utc>,
    pub active_operations: BTreeSet<String>,
    pub error_count: u32,
    pub registered_at: DateTime<Utc>,
    /// Milliseconds since registration, filled in when a snapshot is taken
    pub uptime_ms: u64,
}

// ============================================================================
// Telemetry
// ============================================================================

/// A single telemetry reading value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Numeric(f64),
    Flag(bool),
    Text(String),
    Structured(Map<String, Value>),
}

impl TelemetryValue {
    /// Name of the value kind, as used in stream definitions
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryValue::Numeric(_) => "numeric",
            TelemetryValue::Flag(_) => "boolean",
            TelemetryValue::Text(_) => "string",
            TelemetryValue::Structured(_) => "json",
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        TelemetryValue::Numeric(value)
    }
}

impl From<bool> for TelemetryValue {
    fn from(value: bool) -> Self {
        TelemetryValue::Flag(value)
    }
}

impl From<&str> for TelemetryValue {
    fn from(value: &str) -> Self {
        TelemetryValue::Text(value.to_string())
    }
}

/// Telemetry reading with lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TelemetryPayload {
    pub value: TelemetryValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    /// 0-1, for model-derived readings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Declared data type of a telemetry stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamDataType {
    Numeric,
    String,
    Boolean,
    Json,
}

/// A permitted discrete value of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedValue {
    Number(f64),
    Text(String),
}

/// Definition of a telemetry stream a device publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TelemetryStream {
    pub stream_name: String,
    pub data_type: StreamDataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<AllowedValue>>,
}

/// Body of the outbound telemetry call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TelemetryEnvelope {
    pub device_id: String,
    pub stream_name: String,
    pub payload: TelemetryPayload,
    pub timestamp: DateTime<Utc>,
}

/// Returned to the caller once the platform accepted a reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    pub record_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub received: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

// ============================================================================
// Operator signatures
// ============================================================================

/// Algorithm the operator's credential was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    #[serde(rename = "RSA-PSS-SHA256")]
    RsaPssSha256,
    #[serde(rename = "ECDSA-SHA256")]
    EcdsaSha256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::RsaPssSha256 => "RSA-PSS-SHA256",
            SigningAlgorithm::EcdsaSha256 => "ECDSA-SHA256",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator authorization attached to a command
///
/// The `signature` blob is opaque here: it is length-checked and forwarded
/// into the manifest, never verified. Cryptographic verification belongs to
/// the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorSignature {
    pub operator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_algorithm: Option<SigningAlgorithm>,
    #[serde(
        default,
        rename = "certificatePEM",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_pem: Option<String>,
}

/// The part of a signature that travels in the command envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignatureSummary {
    pub operator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&OperatorSignature> for SignatureSummary {
    fn from(signature: &OperatorSignature) -> Self {
        Self {
            operator_id: signature.operator_id.clone(),
            operator_name: signature.operator_name.clone(),
            timestamp: signature.timestamp,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Body of the outbound command call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandEnvelope {
    pub command_id: String,
    pub device_id: String,
    pub command_name: String,
    pub params: CommandParams,
    pub operator_signature: SignatureSummary,
    pub command_hash: String,
}

/// Platform reply to a command call: `{ "data": { "status", "result" } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformReply {
    #[serde(default)]
    pub data: Option<CommandAck>,
}

/// Acknowledgement data reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Status of a command as seen by callers
///
/// Dispatch only ever produces `Success` or `Failure`; the other variants are
/// reserved for asynchronous execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Sent,
    Acknowledged,
    Executing,
    Success,
    Failure,
}

/// Terminal outcome recorded in a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    Success,
    Failure,
}

impl From<ManifestStatus> for CommandStatus {
    fn from(status: ManifestStatus) -> Self {
        match status {
            ManifestStatus::Success => CommandStatus::Success,
            ManifestStatus::Failure => CommandStatus::Failure,
        }
    }
}

/// Kinds of audit events recorded during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    CommandQueued,
    OperatorSignatureCaptured,
    PlatformTransmissionInitiated,
    DeviceAcknowledged,
    ManifestGenerated,
    CommandFailed,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::CommandQueued => "command_queued",
            AuditEventKind::OperatorSignatureCaptured => "operator_signature_captured",
            AuditEventKind::PlatformTransmissionInitiated => "platform_transmission_initiated",
            AuditEventKind::DeviceAcknowledged => "device_acknowledged",
            AuditEventKind::ManifestGenerated => "manifest_generated",
            AuditEventKind::CommandFailed => "command_failed",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event: AuditEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

/// Signed, hash-committed record of one command attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandManifest {
    pub manifest_id: String,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub command_name: String,
    pub operator_id: String,
    pub operator_name: String,
    pub status: ManifestStatus,
    pub command_hash: String,
    pub signature_algorithm: SigningAlgorithm,
    pub signature: String,
    pub params_snapshot: CommandParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub audit_trail: Vec<AuditEvent>,
    pub compliance_frameworks: Vec<String>,
}

/// Final record of a dispatched command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command_id: String,
    pub device_id: String,
    pub command_name: String,
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub manifest: CommandManifest,
    pub audit_trail: Vec<AuditEvent>,
}

/// Batch-level compliance record for ingested telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryManifest {
    pub manifest_id: String,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub stream_name: String,
    pub record_count: usize,
    pub batch_hash: String,
    pub compliance_frameworks: Vec<String>,
}

// ============================================================================
// Simulation
// ============================================================================

/// Fault injected during a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    #[default]
    None,
    SensorDrift,
    CommunicationTimeout,
    CommandRejected,
}

/// Parameters of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationConfig {
    /// Milliseconds
    pub duration: u64,
    /// Milliseconds between telemetry rounds
    pub telemetry_interval: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<f64>,
}
