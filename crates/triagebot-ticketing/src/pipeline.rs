//! Ticket-manager orchestration (§4.3): reporter resolution, the circuit
//! breaker wrapping every helpdesk call, the fallback queue, and the bus
//! publishes that close the loop back to the classifier/transport.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use triagebot_bus::topics;
use triagebot_core::types::{Category, Priority, TicketSpec, Urgency};

use crate::app::AppState;
use crate::circuit_breaker::Admission;
use crate::fallback;
use crate::helpdesk::CreateTicketRequest;
use crate::reporter::{reporter_from_sender_id, resolve_contact_id};

#[derive(Debug, Deserialize)]
struct TicketCreateRequest {
    ticket_id: String,
    subject: String,
    description: String,
    category: Category,
    urgency: Urgency,
    reporter_id: String,
    source_message_id: String,
    source_conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct TicketUpdateRequest {
    ticket_id: String,
    add_note: String,
    #[serde(default)]
    #[allow(dead_code)]
    author: String,
}

#[derive(Debug, Serialize)]
struct TicketCreatedEvent {
    ticket_id: String,
    external_id: Option<String>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct TicketUpdatedEvent {
    ticket_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Handle a `ticket:create:request` (§4.3 state machine, `received` entry).
pub async fn handle_create_request(state: &AppState, payload: &str) {
    let req: TicketCreateRequest = match serde_json::from_str(payload) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed ticket:create:request payload, dropping");
            return;
        }
    };

    let spec = TicketSpec {
        ticket_id: req.ticket_id,
        subject: req.subject,
        description: req.description,
        urgency: req.urgency,
        category: req.category,
        reporter: reporter_from_sender_id(&req.reporter_id),
        source_message_id: req.source_message_id,
        source_conversation_id: req.source_conversation_id,
        attempt_count: 0,
        last_error: None,
    };

    attempt_create(state, spec).await;
}

/// Try to create `spec`'s ticket right now. Used both by the direct
/// `received` path and, with a fresh `TicketSpec`, has no caller other than
/// [`handle_create_request`] — the sweep worker drives its own loop in
/// [`sweep_fallback_queue`] because it must try several entries under one
/// breaker admission budget.
pub(crate) async fn attempt_create(state: &AppState, mut spec: TicketSpec) {
    match state.breaker.try_acquire() {
        Admission::Rejected => {
            spec.last_error = Some("circuit breaker open".to_string());
            enqueue_for_retry(state, spec).await;
        }
        Admission::Allowed | Admission::AllowedAsProbe => match create_ticket_via_helpdesk(state, &spec).await {
            Ok(external_id) => {
                state.breaker.record_success();
                info!(ticket_id = %spec.ticket_id, external_id, "ticket created");
                publish_created(state, &spec.ticket_id, Some(external_id), true, None).await;
            }
            Err(e) => {
                if e.counts_as_breaker_failure() {
                    state.breaker.record_failure();
                }
                warn!(error = %e, ticket_id = %spec.ticket_id, "ticket creation failed, enqueuing to fallback queue");
                spec.attempt_count += 1;
                spec.last_error = Some(e.to_string());
                enqueue_for_retry(state, spec).await;
            }
        },
    }
}

async fn enqueue_for_retry(state: &AppState, spec: TicketSpec) {
    if let Err(e) = fallback::enqueue(&state.store, &spec).await {
        warn!(error = %e, ticket_id = %spec.ticket_id, "failed to persist ticket to fallback queue");
    }
}

/// Resolve the reporter's contact and create the ticket. One logical
/// helpdesk operation for circuit-breaker purposes even though it may issue
/// more than one HTTP request (contact search/create, then ticket create).
async fn create_ticket_via_helpdesk(state: &AppState, spec: &TicketSpec) -> crate::error::Result<String> {
    let contact_id = resolve_contact_id(&state.helpdesk, &spec.reporter).await?;
    let ticket = state
        .helpdesk
        .create_ticket(&CreateTicketRequest {
            subject: spec.subject.clone(),
            description: spec.description.clone(),
            category: spec.category.to_string(),
            urgency: spec.urgency.to_string(),
            department_id: state.settings.department_id.clone(),
            contact_id,
        })
        .await?;
    Ok(ticket.id)
}

/// Handle a `ticket:update:request` (append-a-note to an already-created
/// ticket). No fallback queue for updates — §4.3 scopes the persistent
/// retry queue to ticket *creation* only.
pub async fn handle_update_request(state: &AppState, payload: &str) {
    let req: TicketUpdateRequest = match serde_json::from_str(payload) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed ticket:update:request payload, dropping");
            return;
        }
    };

    match state.breaker.try_acquire() {
        Admission::Rejected => {
            publish_updated(state, &req.ticket_id, false, Some("circuit breaker open".to_string())).await;
        }
        Admission::Allowed | Admission::AllowedAsProbe => {
            match state.helpdesk.update_ticket(&req.ticket_id, &req.add_note).await {
                Ok(()) => {
                    state.breaker.record_success();
                    publish_updated(state, &req.ticket_id, true, None).await;
                }
                Err(e) => {
                    if e.counts_as_breaker_failure() {
                        state.breaker.record_failure();
                    }
                    warn!(error = %e, ticket_id = %req.ticket_id, "ticket update failed");
                    publish_updated(state, &req.ticket_id, false, Some(e.to_string())).await;
                }
            }
        }
    }
}

/// Scan `tickets:pending` and retry each entry up to
/// `fallback_max_attempts` times, `fallback_retry_delay_secs` apart (§4.3).
/// Entries that still fail are kept in the queue with their attempt count
/// and last error updated; a breaker that reopens mid-sweep stops further
/// attempts on the entry currently in hand but does not block later
/// entries from being tried again on the next sweep.
pub async fn sweep_fallback_queue(state: &AppState) -> crate::error::Result<()> {
    let entries = fallback::load_all(&state.store).await?;
    if entries.is_empty() {
        return Ok(());
    }

    info!(count = entries.len(), "sweeping ticket fallback queue");
    let mut remaining = Vec::with_capacity(entries.len());

    for mut spec in entries {
        let mut created: Option<String> = None;

        for attempt in 0..state.settings.fallback_max_attempts {
            match state.breaker.try_acquire() {
                Admission::Rejected => break,
                Admission::Allowed | Admission::AllowedAsProbe => {
                    match create_ticket_via_helpdesk(state, &spec).await {
                        Ok(external_id) => {
                            state.breaker.record_success();
                            created = Some(external_id);
                            break;
                        }
                        Err(e) => {
                            if e.counts_as_breaker_failure() {
                                state.breaker.record_failure();
                            }
                            spec.attempt_count += 1;
                            spec.last_error = Some(e.to_string());
                            if attempt + 1 < state.settings.fallback_max_attempts {
                                tokio::time::sleep(std::time::Duration::from_secs(
                                    state.settings.fallback_retry_delay_secs,
                                ))
                                .await;
                            }
                        }
                    }
                }
            }
        }

        match created {
            Some(external_id) => {
                info!(ticket_id = %spec.ticket_id, external_id, "fallback queue entry created");
                publish_created(state, &spec.ticket_id, Some(external_id), true, None).await;
            }
            None => {
                warn!(
                    ticket_id = %spec.ticket_id,
                    attempt_count = spec.attempt_count,
                    "fallback queue entry still failing, leaving in place"
                );
                remaining.push(spec);
            }
        }
    }

    fallback::replace_all(&state.store, &remaining).await?;
    Ok(())
}

async fn publish_created(state: &AppState, ticket_id: &str, external_id: Option<String>, success: bool, error: Option<String>) {
    let event = TicketCreatedEvent {
        ticket_id: ticket_id.to_string(),
        external_id,
        success,
        error,
    };
    publish(state, topics::TICKET_CREATED, &event, Priority::High).await;
}

async fn publish_updated(state: &AppState, ticket_id: &str, success: bool, error: Option<String>) {
    let event = TicketUpdatedEvent {
        ticket_id: ticket_id.to_string(),
        success,
        error,
    };
    publish(state, topics::TICKET_UPDATED, &event, Priority::Normal).await;
}

async fn publish<T: Serialize>(state: &AppState, topic: &str, payload: &T, priority: Priority) {
    let channel = topics::namespaced(&state.bus_namespace, topic);
    match serde_json::to_string(payload) {
        Ok(body) => state.publisher.publish(&channel, body, priority).await,
        Err(e) => warn!(error = %e, topic, "failed to serialize outgoing payload"),
    }
}
