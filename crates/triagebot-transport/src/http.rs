//! HTTP admin surface (§6): health/status, manual send, and session
//! management (backup/restore/list), grounded on the teacher's
//! `skynet-gateway::http::health` handler shape.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use triagebot_core::identity::{normalize_destination, validate_destination};
use triagebot_core::types::{OutboundBody, OutboundCommand, Priority};

use crate::app::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": if state.is_connected() { "ok" } else { "degraded" },
        "transport_connected": state.is_connected(),
    }))
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "transport_connected": state.is_connected(),
        "bus_namespace": state.bus_namespace,
        "session_usable": state.sessions.is_usable(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub destination: String,
    pub text: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub quoted_message_id: Option<String>,
}

pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let destination = normalize_destination(&req.destination);
    if !validate_destination(&destination) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid destination"})),
        ));
    }

    let priority = match req.priority.as_deref() {
        Some("high") => Priority::High,
        _ => Priority::Normal,
    };

    let command = OutboundCommand {
        id: uuid::Uuid::now_v7().to_string(),
        destination,
        body: OutboundBody::Text(req.text),
        mentions: vec![],
        quoted_message_id: req.quoted_message_id,
        priority,
        scheduled_at: None,
        template: None,
        retry_count: 0,
        retry_history: vec![],
    };

    let accepted = state.outbound_queue.push(command).await;
    if accepted {
        Ok(Json(json!({"status": "queued"})))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "outbound queue overflow, command dropped"})),
        ))
    }
}

pub async fn session_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"usable": state.sessions.is_usable()}))
}

pub async fn session_backup_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .sessions
        .backup()
        .map(|path| Json(json!({"backup_path": path.to_string_lossy()})))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        })
}

pub async fn session_backups_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .sessions
        .list_backups()
        .map(|backups| Json(json!({"backups": backups})))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        })
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub backup_name: String,
}

pub async fn session_restore_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .sessions
        .restore(&req.backup_name)
        .map(|()| Json(json!({"status": "restored"})))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        })
}
