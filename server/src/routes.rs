//! HTTP routes of the platform simulator

use crate::ledger::Ledger;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use instrument_shared::codec::command_hash;
use instrument_shared::{parse_strict, CommandEnvelope, FailureMode, TelemetryEnvelope};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state of every route
pub struct AppState {
    pub ledger: Ledger,
    pub api_key: String,
    pub failure_mode: FailureMode,
}

type AppStateArc = Arc<AppState>;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub fn router(state: AppStateArc) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/telemetry/ingest", post(ingest_telemetry))
        .route("/api/commands/execute", post(execute_command))
        .route("/api/ledger/:device_id", get(device_ledger))
        .with_state(state)
}

/// Require `Authorization: Bearer <api key>`
fn authorize(headers: &HeaderMap, api_key: &str) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == api_key => Ok(()),
        Some(_) => Err(api_error(StatusCode::UNAUTHORIZED, "Invalid API key")),
        None => Err(api_error(StatusCode::UNAUTHORIZED, "Missing bearer token")),
    }
}

async fn health(State(state): State<AppStateArc>) -> Json<Value> {
    let (telemetry, commands) = state.ledger.totals().await;
    Json(json!({
        "status": "ok",
        "devices": state.ledger.known_devices().await.len(),
        "telemetryRecords": telemetry,
        "commandRecords": commands,
    }))
}

async fn ingest_telemetry(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&headers, &state.api_key)?;

    let envelope: TelemetryEnvelope = parse_strict(body).map_err(|e| {
        warn!("Rejected telemetry: {}", e);
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string(), "violations": e.violations })),
        )
    })?;

    let record = state.ledger.record_telemetry(envelope).await;
    debug!(
        "[{}] {} -> {}",
        record.envelope.device_id, record.envelope.stream_name, record.record_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "data": {
                "recordId": record.record_id,
                "received": true,
                "timestamp": record.received_at,
            }
        })),
    ))
}

async fn execute_command(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers, &state.api_key)?;

    let envelope: CommandEnvelope = serde_json::from_value(body)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let expected = command_hash(&envelope.device_id, &envelope.command_name, &envelope.params)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    if expected != envelope.command_hash {
        warn!(
            "[{}] Hash mismatch on command {}",
            envelope.device_id, envelope.command_id
        );
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Command hash does not match its contents",
        ));
    }

    if state.failure_mode == FailureMode::CommandRejected {
        warn!(
            "[{}] Rejecting {} ({}): simulated device rejection",
            envelope.device_id, envelope.command_name, envelope.command_id
        );
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Command rejected by device",
        ));
    }

    info!(
        "[{}] {} acknowledged (operator {})",
        envelope.device_id, envelope.command_name, envelope.operator_signature.operator_id
    );
    let record = state.ledger.record_command(envelope).await;

    Ok(Json(json!({
        "data": {
            "status": "ACKNOWLEDGED",
            "result": {
                "accepted": true,
                "commandId": record.command_id,
                "acknowledgedAt": record.acknowledged_at,
            }
        }
    })))
}

async fn device_ledger(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers, &state.api_key)?;

    let telemetry = state.ledger.telemetry_for(&device_id).await;
    let commands = state.ledger.commands_for(&device_id).await;
    if telemetry.is_empty() && commands.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No records for device {}", device_id),
        ));
    }

    Ok(Json(json!({
        "deviceId": device_id,
        "telemetry": telemetry,
        "commands": commands,
    })))
}
