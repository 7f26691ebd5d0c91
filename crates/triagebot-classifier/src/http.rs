//! HTTP admin surface (§6): liveness, a status snapshot, and a manual
//! classify-and-report endpoint for operators debugging the threshold table
//! against a sample message without going through the bus.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::consensus;
use crate::fallback;

pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "bus_namespace": state.bus_namespace,
        "primary_provider": state.primary.name(),
        "secondary_provider": state.secondary.name(),
        "primary_model": state.settings.primary_model,
        "secondary_model": state.settings.secondary_model,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

/// POST /classify — runs the dual-LLM consensus (or the keyword fallback on
/// total provider failure) against `text` and returns the decided action,
/// without touching the store or publishing anything.
pub async fn classify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let settings = &state.settings;
    let timeout = std::time::Duration::from_millis(settings.call_timeout_ms);

    let req_primary = triagebot_llm::ClassificationRequest {
        model: settings.primary_model.clone(),
        text: req.text.clone(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };
    let req_secondary = triagebot_llm::ClassificationRequest {
        model: settings.secondary_model.clone(),
        text: req.text.clone(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };

    let (primary, secondary) = tokio::join!(
        triagebot_llm::classify_with_timeout(state.primary.as_ref(), &req_primary, timeout),
        triagebot_llm::classify_with_timeout(state.secondary.as_ref(), &req_secondary, timeout),
    );

    let classification = if primary.is_err() && secondary.is_err() {
        fallback::classify(&req.text)
    } else {
        consensus::combine(primary.as_ref().ok(), secondary.as_ref().ok())
    };
    let action = consensus::decide_action(&classification);

    Ok(Json(json!({
        "classification": classification,
        "action": format!("{action:?}"),
    })))
}
