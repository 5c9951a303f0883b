//! Adapter facade
//!
//! Owns the registry, history and pipelines for one process (or one test).
//! Nothing here is global: two adapters never share state.

use crate::clock::{Clock, SystemClock};
use crate::command::{CommandDispatcher, CommandHistory, DispatchContext, HistoryFilter};
use crate::compliance::{self, ComplianceCheck, ComplianceReport, ManifestGenerator};
use crate::config::AdapterConfig;
use crate::connection::{PlatformClient, RetryPolicy, Sleeper, TokioSleeper};
use crate::error::AdapterError;
use crate::metrics::{AdapterMetrics, MetricsSnapshot};
use crate::registry::DeviceRegistry;
use crate::simulation::{self, SimulationReport};
use crate::telemetry::TelemetryPipeline;
use crate::transport::{HttpTransport, PlatformTransport};
use instrument_shared::{
    limits, CommandManifest, CommandParams, CommandResult, DeviceMetadata, DeviceStatus,
    OperatorSignature, SimulationConfig, TelemetryManifest, TelemetryPayload, TelemetryResponse,
    TelemetryStream, Validate,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Assembles an adapter, optionally with injected transport, sleeper and clock
pub struct AdapterBuilder {
    config: AdapterConfig,
    transport: Option<Arc<dyn PlatformTransport>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    clock: Option<Arc<dyn Clock>>,
    retry_base_delay: Duration,
    max_signature_skew_ms: u64,
}

impl AdapterBuilder {
    fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            transport: None,
            sleeper: None,
            clock: None,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            max_signature_skew_ms: limits::MAX_SIGNATURE_SKEW_MS,
        }
    }

    /// Use `transport` instead of HTTP
    pub fn transport(mut self, transport: Arc<dyn PlatformTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Maximum accepted age of an operator signature
    pub fn max_signature_skew_ms(mut self, max_skew_ms: u64) -> Self {
        self.max_signature_skew_ms = max_skew_ms;
        self
    }

    /// Validate the config and wire the components together
    pub fn build(self) -> Result<InstrumentAdapter, AdapterError> {
        self.config.validate()?;

        let transport: Arc<dyn PlatformTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let policy = RetryPolicy::new(self.config.retry_attempts, self.retry_base_delay);
        let client = Arc::new(PlatformClient::new(transport.clone(), sleeper, policy));
        let registry = Arc::new(DeviceRegistry::new(clock.clone()));
        let history = Arc::new(CommandHistory::new());
        let metrics = Arc::new(AdapterMetrics::new(self.config.enable_metrics));
        let manifests = Arc::new(ManifestGenerator::new(clock.clone()));

        let telemetry = TelemetryPipeline::new(
            registry.clone(),
            client.clone(),
            manifests.clone(),
            metrics.clone(),
            clock.clone(),
        );
        let dispatcher = CommandDispatcher::new(
            DispatchContext {
                registry: registry.clone(),
                client,
                manifests,
                history: history.clone(),
                metrics: metrics.clone(),
                clock: clock.clone(),
            },
            self.config.operator_id.clone(),
            self.max_signature_skew_ms,
        );

        info!(
            "Adapter ready: platform={} via {} (operator {}, {} attempts, timeout {} ms)",
            self.config.platform_url,
            transport.name(),
            self.config.operator_id,
            self.config.retry_attempts,
            self.config.timeout
        );

        Ok(InstrumentAdapter {
            config: self.config,
            registry,
            telemetry,
            dispatcher,
            history,
            metrics,
            clock,
            max_signature_skew_ms: self.max_signature_skew_ms,
        })
    }
}

/// Instrument command & compliance adapter
pub struct InstrumentAdapter {
    config: AdapterConfig,
    registry: Arc<DeviceRegistry>,
    telemetry: TelemetryPipeline,
    dispatcher: CommandDispatcher,
    history: Arc<CommandHistory>,
    metrics: Arc<AdapterMetrics>,
    clock: Arc<dyn Clock>,
    max_signature_skew_ms: u64,
}

impl InstrumentAdapter {
    /// Create an adapter that talks HTTP to the configured platform
    pub fn new(config: AdapterConfig) -> Result<Self, AdapterError> {
        Self::builder(config).build()
    }

    pub fn builder(config: AdapterConfig) -> AdapterBuilder {
        AdapterBuilder::new(config)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    pub async fn register_device(&self, metadata: DeviceMetadata) -> Result<DeviceStatus, AdapterError> {
        self.registry.register(metadata).await
    }

    pub async fn list_devices(&self) -> Vec<DeviceMetadata> {
        self.registry.list().await
    }

    pub async fn get_device_status(&self, device_id: &str) -> Result<DeviceStatus, AdapterError> {
        self.registry.status(device_id).await
    }

    pub async fn device_metadata(&self, device_id: &str) -> Result<DeviceMetadata, AdapterError> {
        let entry = self.registry.require(device_id).await?;
        Ok(entry.metadata().clone())
    }

    pub async fn define_stream(&self, device_id: &str, stream: TelemetryStream) -> Result<(), AdapterError> {
        self.registry.define_stream(device_id, stream).await
    }

    pub async fn stream_definition(&self, device_id: &str, stream_name: &str) -> Option<TelemetryStream> {
        self.registry.stream_definition(device_id, stream_name).await
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    pub async fn push_telemetry(
        &self,
        device_id: &str,
        stream_name: &str,
        payload: TelemetryPayload,
    ) -> Result<TelemetryResponse, AdapterError> {
        self.telemetry.push(device_id, stream_name, payload).await
    }

    pub async fn build_telemetry_manifest(
        &self,
        device_id: &str,
        stream_name: &str,
        payloads: &[TelemetryPayload],
    ) -> Result<TelemetryManifest, AdapterError> {
        self.telemetry
            .build_batch_manifest(device_id, stream_name, payloads)
            .await
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn send_command(
        &self,
        device_id: &str,
        command_name: &str,
        params: CommandParams,
        signature: OperatorSignature,
    ) -> Result<CommandResult, AdapterError> {
        self.dispatcher
            .send_command(device_id, command_name, params, signature)
            .await
    }

    /// Every finished command, oldest first
    pub async fn command_history(&self) -> Vec<CommandResult> {
        self.history.snapshot().await
    }

    pub async fn filter_history(&self, filter: &HistoryFilter) -> Vec<CommandResult> {
        self.history.filter(filter).await
    }

    // ------------------------------------------------------------------
    // Compliance
    // ------------------------------------------------------------------

    pub async fn generate_compliance_report(&self) -> ComplianceReport {
        compliance::generate_command_summary(&self.history.snapshot().await)
    }

    pub fn validate_compliance(&self, manifest: &CommandManifest) -> ComplianceCheck {
        compliance::validate_compliance(manifest, self.clock.now(), self.max_signature_skew_ms)
    }

    pub fn verify_manifest_integrity(&self, manifest: &CommandManifest) -> bool {
        compliance::verify_manifest_integrity(manifest)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn run_simulation(
        &self,
        device_id: &str,
        config: SimulationConfig,
    ) -> Result<SimulationReport, AdapterError> {
        simulation::run(self, device_id, config).await
    }

    /// Log final counters
    pub async fn shutdown(&self) {
        self.metrics.log_summary();
        info!("Adapter stopped ({} commands recorded)", self.history.len().await);
    }
}
