use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use instrument_adapter::{AdapterConfig, InstrumentAdapter};
use instrument_shared::{
    format_duration, parse_strict, DeviceMetadata, FailureMode, SimulationConfig, TelemetryStream,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Instrument command & compliance adapter
#[derive(Parser)]
#[command(name = "instrument-adapter", version, about, long_about = None)]
struct Cli {
    /// Adapter configuration file (TOML)
    #[arg(long, short, global = true, default_value = "adapter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a device and stream synthetic telemetry to the platform
    Simulate {
        /// Device metadata (JSON)
        #[arg(long)]
        device: PathBuf,

        /// Stream definitions (JSON array)
        #[arg(long)]
        streams: Option<PathBuf>,

        /// Run length in milliseconds
        #[arg(long, default_value_t = 60_000)]
        duration: u64,

        /// Milliseconds between telemetry rounds
        #[arg(long, default_value_t = 1_000)]
        interval: u64,

        /// none, sensor_drift, communication_timeout or command_rejected
        #[arg(long, value_parser = parse_failure_mode)]
        failure_mode: Option<FailureMode>,

        /// Probability in [0, 1] used by the failure mode
        #[arg(long)]
        failure_rate: Option<f64>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn parse_failure_mode(s: &str) -> Result<FailureMode, String> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| format!("unknown failure mode '{}'", s))
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AdapterConfig::load(&cli.config)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::CheckConfig => {
            info!("Configuration OK: {:?}", config);
            Ok(())
        }
        Commands::Simulate {
            device,
            streams,
            duration,
            interval,
            failure_mode,
            failure_rate,
        } => {
            let metadata: DeviceMetadata = parse_strict(read_json(&device)?)?;
            let definitions: Vec<TelemetryStream> = match streams {
                Some(path) => serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("invalid stream definitions in {}", path.display()))?,
                None => Vec::new(),
            };

            let adapter = InstrumentAdapter::new(config)?;
            let device_id = metadata.device_id.clone();
            adapter.register_device(metadata).await?;
            for definition in definitions {
                adapter.define_stream(&device_id, definition).await?;
            }

            let simulation = SimulationConfig {
                duration,
                telemetry_interval: interval,
                failure_mode,
                failure_rate,
            };

            let result = tokio::select! {
                report = adapter.run_simulation(&device_id, simulation) => Some(report?),
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping simulation");
                    None
                }
            };

            if let Some(report) = result {
                info!(
                    "{}: {} readings sent, {} failed, {} skipped in {}",
                    report.device_id,
                    report.readings_sent,
                    report.readings_failed,
                    report.readings_skipped,
                    format_duration(report.elapsed_ms)
                );
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            adapter.shutdown().await;
            Ok(())
        }
    }
}
