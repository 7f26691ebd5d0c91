//! Per-message classification pipeline (§4.2): thread resolution first,
//! then (on no match) dual-LLM consensus, then the action the confidence
//! threshold selects.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use triagebot_bus::topics;
use triagebot_core::config::INCIDENT_TTL_SECS;
use triagebot_core::types::{InboundMessage, IncidentRecord, Priority};

use crate::consensus::{self, Action};
use crate::fallback;
use crate::threading;
use crate::app::AppState;

/// Handle a single inbound message end to end: try threading first, fall
/// back to classification, and publish whatever outcome results.
pub async fn handle_inbound(state: &AppState, msg: InboundMessage) {
    let now = Utc::now();

    match threading::resolve_thread(
        &state.store,
        &msg.conversation_id,
        msg.quoted.as_ref(),
        &state.settings.bot_identity,
        now,
    )
    .await
    {
        Ok(Some(ticket_id)) => {
            append_to_thread(state, &msg, &ticket_id, now).await;
            return;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, message_id = %msg.id, "threading lookup failed, proceeding to classification");
        }
    }

    classify_new(state, msg, now).await;
}

async fn append_to_thread(
    state: &AppState,
    msg: &InboundMessage,
    ticket_id: &str,
    now: chrono::DateTime<Utc>,
) {
    let key = IncidentRecord::store_key(&msg.conversation_id, ticket_id);
    let record: Option<IncidentRecord> = match state.store.get_json(&key).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, ticket_id, "failed to load incident record for thread append");
            return;
        }
    };

    let Some(mut record) = record else {
        warn!(ticket_id, "threading resolved a ticket with no backing record");
        return;
    };

    record.message_ids.push(msg.id.clone());
    record.last_update = now;

    if let Err(e) = state.store.set_json_ttl(&key, &record, Duration::from_secs(INCIDENT_TTL_SECS)).await {
        warn!(error = %e, ticket_id, "failed to persist thread append");
        return;
    }

    let update_payload = serde_json::json!({
        "ticket_id": ticket_id,
        "add_note": msg.text,
        "author": msg.sender_id,
    });
    publish(state, topics::TICKET_UPDATE_REQUEST, &update_payload, Priority::Normal).await;

    let ack_payload = serde_json::json!({
        "conversation_id": msg.conversation_id,
        "quoted_message_id": msg.id,
        "text": format!("Recibido, se agregó a Ticket #{ticket_id}."),
    });
    publish(state, topics::AGENT_RESPONSE, &ack_payload, Priority::Normal).await;

    info!(ticket_id, message_id = %msg.id, "appended message to existing incident thread");
}

async fn classify_new(state: &AppState, msg: InboundMessage, now: chrono::DateTime<Utc>) {
    let settings = &state.settings;
    let req_primary = triagebot_llm::ClassificationRequest {
        model: settings.primary_model.clone(),
        text: msg.text.clone(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };
    let req_secondary = triagebot_llm::ClassificationRequest {
        model: settings.secondary_model.clone(),
        text: msg.text.clone(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };
    let timeout = Duration::from_millis(settings.call_timeout_ms);

    let (primary, secondary) = tokio::join!(
        triagebot_llm::classify_with_timeout(state.primary.as_ref(), &req_primary, timeout),
        triagebot_llm::classify_with_timeout(state.secondary.as_ref(), &req_secondary, timeout),
    );

    if let Err(e) = &primary {
        warn!(error = %e, message_id = %msg.id, "primary classifier call failed");
    }
    if let Err(e) = &secondary {
        warn!(error = %e, message_id = %msg.id, "secondary classifier call failed");
    }

    let classification = if primary.is_err() && secondary.is_err() {
        fallback::classify(&msg.text)
    } else {
        consensus::combine(primary.as_ref().ok(), secondary.as_ref().ok())
    };

    let action = consensus::decide_action(&classification);
    info!(
        message_id = %msg.id,
        is_incident = classification.is_incident,
        confidence = classification.confidence,
        consensus_kind = ?classification.consensus_kind,
        action = ?action,
        "classification decided"
    );

    match action {
        Action::AutoCreate => auto_create(state, &msg, &classification, now).await,
        Action::AskConfirm => ask_confirm(state, &msg, &classification).await,
        Action::LogOnly => {}
    }
}

async fn auto_create(
    state: &AppState,
    msg: &InboundMessage,
    classification: &triagebot_core::types::Classification,
    now: chrono::DateTime<Utc>,
) {
    let (Some(category), Some(urgency)) = (classification.category, classification.urgency) else {
        warn!(message_id = %msg.id, "auto-create decided without category/urgency, downgrading to confirm");
        ask_confirm(state, msg, classification).await;
        return;
    };

    let ticket_id = Uuid::now_v7().to_string();
    let record = IncidentRecord {
        ticket_id: ticket_id.clone(),
        original_message_id: msg.id.clone(),
        conversation_id: msg.conversation_id.clone(),
        reporter: msg.sender_id.clone(),
        created_at: now,
        category,
        urgency,
        first_message_text: msg.text.clone(),
        message_ids: vec![msg.id.clone()],
        last_update: now,
    };
    let key = IncidentRecord::store_key(&msg.conversation_id, &ticket_id);
    if let Err(e) = state.store.set_json_ttl(&key, &record, Duration::from_secs(INCIDENT_TTL_SECS)).await {
        warn!(error = %e, ticket_id, "failed to persist new incident record");
        return;
    }

    let create_payload = serde_json::json!({
        "ticket_id": ticket_id,
        "subject": format!("{category}: {}", summarize(&msg.text)),
        "description": msg.text,
        "category": category,
        "urgency": urgency,
        "reporter_id": msg.sender_id,
        "source_message_id": msg.id,
        "source_conversation_id": msg.conversation_id,
    });
    publish(state, topics::TICKET_CREATE_REQUEST, &create_payload, Priority::High).await;

    let reply = format!("Ticket #{ticket_id} creado — {category} ({urgency})");
    let ack_payload = serde_json::json!({
        "conversation_id": msg.conversation_id,
        "quoted_message_id": msg.id,
        "text": reply,
    });
    publish(state, topics::AGENT_RESPONSE, &ack_payload, Priority::Normal).await;
}

async fn ask_confirm(
    state: &AppState,
    msg: &InboundMessage,
    _classification: &triagebot_core::types::Classification,
) {
    let ack_payload = serde_json::json!({
        "conversation_id": msg.conversation_id,
        "quoted_message_id": msg.id,
        "text": "Parece que describes un problema. ¿Confirmas que quieres crear un ticket de soporte?",
    });
    publish(state, topics::AGENT_RESPONSE, &ack_payload, Priority::Normal).await;
}

fn summarize(text: &str) -> String {
    text.chars().take(64).collect()
}

async fn publish(state: &AppState, topic: &str, payload: &serde_json::Value, priority: Priority) {
    let channel = triagebot_bus::topics::namespaced(&state.bus_namespace, topic);
    match serde_json::to_string(payload) {
        Ok(body) => state.publisher.publish(&channel, body, priority).await,
        Err(e) => warn!(error = %e, topic, "failed to serialize outgoing payload"),
    }
}
