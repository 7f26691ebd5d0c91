//! Persistent fallback queue for ticket-creation jobs the breaker rejected
//! or that failed outright (§4.3). Backed directly by
//! [`triagebot_bus::Store`]'s atomic list operations — no separate
//! in-process buffering, so the queue survives a process restart.
//!
//! The key is the literal `tickets:pending`, not namespaced like the bus
//! topics — the same literal-key treatment `IncidentRecord::store_key` gives
//! `incident:active:...`.

use triagebot_bus::Store;
use triagebot_core::types::TicketSpec;

const FALLBACK_QUEUE_KEY: &str = "tickets:pending";

pub async fn enqueue(store: &Store, spec: &TicketSpec) -> triagebot_bus::Result<()> {
    store.list_push_json(FALLBACK_QUEUE_KEY, spec).await
}

pub async fn load_all(store: &Store) -> triagebot_bus::Result<Vec<TicketSpec>> {
    store.list_get_all_json(FALLBACK_QUEUE_KEY).await
}

/// Atomically replace the whole queue with `remaining` — the sweep's way of
/// committing "these entries were drained, these were retried in place."
pub async fn replace_all(store: &Store, remaining: &[TicketSpec]) -> triagebot_bus::Result<()> {
    store.list_replace_all_json(FALLBACK_QUEUE_KEY, remaining).await
}
