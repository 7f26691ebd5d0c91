//! HTTP admin surface (§6): health/status and a manual ticket-creation
//! endpoint, grounded on the same handler shape used by the other two
//! services' `http.rs`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use triagebot_core::types::{Category, Reporter, TicketSpec, Urgency};

use crate::app::AppState;
use crate::circuit_breaker::BreakerState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let breaker_ok = state.breaker.state() != BreakerState::Open;
    Json(json!({
        "status": if breaker_ok { "ok" } else { "degraded" },
        "helpdesk_circuit_open": !breaker_ok,
    }))
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "bus_namespace": state.bus_namespace,
        "breaker_state": format!("{:?}", state.breaker.state()),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub category: Category,
    pub urgency: Urgency,
    pub reporter: Reporter,
    #[serde(default)]
    pub source_message_id: Option<String>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
}

pub async fn create_ticket_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.reporter.resolution_email().is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "reporter has neither email nor phone"})),
        ));
    }

    let ticket_id = Uuid::now_v7().to_string();
    let spec = TicketSpec {
        ticket_id: ticket_id.clone(),
        subject: req.subject,
        description: req.description,
        urgency: req.urgency,
        category: req.category,
        reporter: req.reporter,
        source_message_id: req.source_message_id.unwrap_or_default(),
        source_conversation_id: req.source_conversation_id.unwrap_or_default(),
        attempt_count: 0,
        last_error: None,
    };

    crate::pipeline::attempt_create(&state, spec).await;
    Ok(Json(json!({"status": "accepted", "ticket_id": ticket_id})))
}
