mod ledger;
mod routes;

use anyhow::Context;
use instrument_shared::FailureMode;
use ledger::Ledger;
use routes::AppState;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let addr = std::env::var("PLATFORM_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let api_key = std::env::var("PLATFORM_API_KEY")
        .context("PLATFORM_API_KEY must be set to the key adapters present")?;
    let failure_mode = match std::env::var("PLATFORM_FAILURE_MODE") {
        Ok(mode) => serde_json::from_value(Value::String(mode.clone()))
            .with_context(|| format!("unknown PLATFORM_FAILURE_MODE '{}'", mode))?,
        Err(_) => FailureMode::None,
    };
    if failure_mode != FailureMode::None {
        warn!("Failure mode active: {:?}", failure_mode);
    }

    let ledger = Ledger::new();
    let state = Arc::new(AppState {
        ledger: ledger.clone(),
        api_key,
        failure_mode,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Platform simulator listening on http://{}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let (telemetry, commands) = ledger.totals().await;
    info!(
        "Platform simulator stopped: {} telemetry records, {} commands",
        telemetry, commands
    );
    Ok(())
}
