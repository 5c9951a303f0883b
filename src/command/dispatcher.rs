//! Command dispatcher for sending operator-signed commands to instruments
//!
//! Pre-flight checks (device lookup, signature structure) fail with an error
//! and leave no trace. Once `command_queued` is recorded every outcome,
//! including a stale signature, becomes a manifest-bearing [`CommandResult`].

use super::audit::{details, AuditTrailBuilder};
use super::history::CommandHistory;
use crate::clock::Clock;
use crate::compliance::{ManifestGenerator, ManifestRequest};
use crate::connection::PlatformClient;
use crate::error::AdapterError;
use crate::metrics::AdapterMetrics;
use crate::registry::DeviceRegistry;
use instrument_shared::codec;
use instrument_shared::state_machine::{CommandStateMachine, DispatchEvent, Transition};
use instrument_shared::validation::Violations;
use instrument_shared::{
    format_duration, skew_ms, AuditEventKind, CommandAck, CommandEnvelope, CommandParams,
    CommandResult, CommandStatus, ManifestStatus, OperatorSignature, SignatureSummary, Validate,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One command attempt in flight
struct Attempt<'a> {
    command_id: String,
    device_id: &'a str,
    command_name: &'a str,
    params: &'a CommandParams,
    signature: &'a OperatorSignature,
    fsm: CommandStateMachine,
    trail: AuditTrailBuilder,
    /// Hash sent to the platform, once computed
    committed_hash: Option<String>,
}

impl Attempt<'_> {
    fn advance(&mut self, event: DispatchEvent) {
        match self.fsm.process_event(event) {
            Transition::Advanced(state) => {
                debug!("Command {} -> {}", self.command_id, state);
            }
            Transition::Failed { from, reason } => {
                warn!("Command {} failed in {}: {}", self.command_id, from, reason);
            }
            Transition::Invalid { from, event } => {
                error!(
                    "Command {}: event {:?} not valid in {}",
                    self.command_id, event, from
                );
            }
        }
    }
}

/// Components a dispatcher reads from and records into
#[derive(Clone)]
pub struct DispatchContext {
    pub registry: Arc<DeviceRegistry>,
    pub client: Arc<PlatformClient>,
    pub manifests: Arc<ManifestGenerator>,
    pub history: Arc<CommandHistory>,
    pub metrics: Arc<AdapterMetrics>,
    pub clock: Arc<dyn Clock>,
}

/// Dispatches commands and records their compliance trail
pub struct CommandDispatcher {
    registry: Arc<DeviceRegistry>,
    client: Arc<PlatformClient>,
    manifests: Arc<ManifestGenerator>,
    history: Arc<CommandHistory>,
    metrics: Arc<AdapterMetrics>,
    clock: Arc<dyn Clock>,
    /// Operator the adapter transmits on behalf of
    operator_id: String,
    max_skew_ms: u64,
}

impl CommandDispatcher {
    pub fn new(context: DispatchContext, operator_id: impl Into<String>, max_skew_ms: u64) -> Self {
        let DispatchContext {
            registry,
            client,
            manifests,
            history,
            metrics,
            clock,
        } = context;

        Self {
            registry,
            client,
            manifests,
            history,
            metrics,
            clock,
            operator_id: operator_id.into(),
            max_skew_ms,
        }
    }

    /// Dispatch a command to a registered device
    pub async fn send_command(
        &self,
        device_id: &str,
        command_name: &str,
        params: CommandParams,
        signature: OperatorSignature,
    ) -> Result<CommandResult, AdapterError> {
        let entry = self.registry.require(device_id).await?;
        signature.validate()?;
        if command_name.trim().is_empty() {
            let mut v = Violations::new();
            v.push("commandName", "is not allowed to be empty");
            v.finish("Command")?;
        }

        let started = Instant::now();
        let mut attempt = Attempt {
            command_id: Uuid::new_v4().to_string(),
            device_id,
            command_name,
            params: &params,
            signature: &signature,
            fsm: CommandStateMachine::new(),
            trail: AuditTrailBuilder::new(self.clock.clone()),
            committed_hash: None,
        };

        entry.begin_operation(&attempt.command_id).await;
        attempt.trail.add_event(
            AuditEventKind::CommandQueued,
            details(json!({ "commandId": attempt.command_id, "commandName": command_name })),
            Some(device_id),
        );
        info!(
            "Command {} queued: {} -> {} by {}",
            attempt.command_id, command_name, device_id, signature.operator_id
        );

        let result = match self.transmit(&mut attempt).await {
            Ok(ack) => self.complete(&mut attempt, ack, started),
            Err(e) => self.fail(&mut attempt, e, started),
        };

        entry
            .finish_operation(&result.command_id, !result.is_success())
            .await;
        if result.is_success() {
            self.metrics.command_succeeded();
        } else {
            self.metrics.command_failed();
        }
        self.history.append(result.clone()).await;

        Ok(result)
    }

    /// Freshness check, hash commitment and transmission
    async fn transmit(&self, attempt: &mut Attempt<'_>) -> Result<CommandAck, AdapterError> {
        let signature = attempt.signature;

        let skew = skew_ms(signature.timestamp, self.clock.now());
        if skew > self.max_skew_ms {
            return Err(AdapterError::StaleSignature {
                skew_ms: skew,
                max_skew_ms: self.max_skew_ms,
            });
        }
        attempt.advance(DispatchEvent::SignatureAccepted);
        attempt.trail.add_event(
            AuditEventKind::OperatorSignatureCaptured,
            details(json!({
                "operatorId": signature.operator_id,
                "algorithm": signature.signing_algorithm.unwrap_or_default().as_str(),
            })),
            Some(signature.operator_id.as_str()),
        );

        let command_hash =
            codec::command_hash(attempt.device_id, attempt.command_name, attempt.params)?;
        attempt.committed_hash = Some(command_hash.clone());
        attempt.advance(DispatchEvent::HashComputed);

        attempt.trail.add_event(
            AuditEventKind::PlatformTransmissionInitiated,
            details(json!({ "commandId": attempt.command_id })),
            Some(self.operator_id.as_str()),
        );
        attempt.advance(DispatchEvent::TransmissionStarted);

        let envelope = CommandEnvelope {
            command_id: attempt.command_id.clone(),
            device_id: attempt.device_id.to_string(),
            command_name: attempt.command_name.to_string(),
            params: attempt.params.clone(),
            operator_signature: SignatureSummary::from(signature),
            command_hash,
        };
        let ack = self.client.execute_command(&envelope).await?;

        attempt.advance(DispatchEvent::PlatformAcknowledged);
        attempt.trail.add_event(
            AuditEventKind::DeviceAcknowledged,
            details(json!({ "status": ack.status })),
            Some(attempt.device_id),
        );
        Ok(ack)
    }

    fn complete(&self, attempt: &mut Attempt<'_>, ack: CommandAck, started: Instant) -> CommandResult {
        let manifest = self.manifests.assemble(
            ManifestRequest {
                device_id: attempt.device_id,
                command_name: attempt.command_name,
                params: attempt.params,
                signature: attempt.signature,
                status: ManifestStatus::Success,
                error: None,
                audit_trail: attempt.trail.events(),
            },
            attempt.committed_hash.clone().unwrap_or_default(),
        );
        attempt.advance(DispatchEvent::ManifestBuilt);
        attempt.trail.add_event(
            AuditEventKind::ManifestGenerated,
            details(json!({ "manifestId": manifest.manifest_id })),
            None,
        );
        attempt.advance(DispatchEvent::Completed);

        let execution_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Command {} succeeded in {} (manifest {})",
            attempt.command_id,
            format_duration(execution_time_ms),
            manifest.manifest_id
        );

        CommandResult {
            command_id: attempt.command_id.clone(),
            device_id: attempt.device_id.to_string(),
            command_name: attempt.command_name.to_string(),
            status: CommandStatus::Success,
            result: ack.result,
            error: None,
            execution_time_ms,
            manifest,
            audit_trail: attempt.trail.events(),
        }
    }

    fn fail(&self, attempt: &mut Attempt<'_>, err: AdapterError, started: Instant) -> CommandResult {
        let message = err.to_string();
        attempt.advance(DispatchEvent::Error(message.clone()));
        attempt.trail.add_event(
            AuditEventKind::CommandFailed,
            details(json!({ "error": message })),
            None,
        );

        let command_hash = match attempt.committed_hash.clone() {
            Some(hash) => hash,
            None => codec::command_hash(attempt.device_id, attempt.command_name, attempt.params)
                .unwrap_or_else(|e| {
                    error!("Command {} could not be hashed: {}", attempt.command_id, e);
                    String::new()
                }),
        };
        let manifest = self.manifests.assemble(
            ManifestRequest {
                device_id: attempt.device_id,
                command_name: attempt.command_name,
                params: attempt.params,
                signature: attempt.signature,
                status: ManifestStatus::Failure,
                error: Some(message.as_str()),
                audit_trail: attempt.trail.events(),
            },
            command_hash,
        );

        let execution_time_ms = started.elapsed().as_millis() as u64;
        error!(
            "Command {} ({} -> {}) failed after {}: {}",
            attempt.command_id,
            attempt.command_name,
            attempt.device_id,
            format_duration(execution_time_ms),
            message
        );

        CommandResult {
            command_id: attempt.command_id.clone(),
            device_id: attempt.device_id.to_string(),
            command_name: attempt.command_name.to_string(),
            status: CommandStatus::Failure,
            result: None,
            error: Some(message),
            execution_time_ms,
            manifest,
            audit_trail: attempt.trail.events(),
        }
    }
}
