use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;

use triagebot_bus::{BusPublisher, Store};
use triagebot_core::config::BUS_PUBLISHER_QUEUE_CAP;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{TicketingConfig, TicketingSettings};
use crate::helpdesk::HelpdeskClient;
use crate::oauth::OAuthStore;

/// Shared state handed to every Axum handler, the bus subscriber loop, and
/// the fallback-queue sweep worker.
pub struct AppState {
    pub config: TicketingConfig,
    pub settings: TicketingSettings,
    pub bus_namespace: String,
    pub store: Store,
    pub publisher: BusPublisher,
    pub helpdesk: HelpdeskClient,
    pub breaker: CircuitBreaker,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: TicketingConfig,
        store: Store,
        publisher: BusPublisher,
        oauth: Arc<OAuthStore>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let settings = config.ticketing.clone();
        let helpdesk = HelpdeskClient::new(&settings, oauth);
        let breaker = CircuitBreaker::new(
            settings.breaker_failure_threshold,
            Duration::from_secs(settings.breaker_cooldown_secs),
        );
        Arc::new(Self {
            bus_namespace: config.bus.namespace.clone(),
            settings,
            store,
            publisher,
            helpdesk,
            breaker,
            shutdown,
            config,
        })
    }
}

pub const PUBLISHER_QUEUE_CAP: usize = BUS_PUBLISHER_QUEUE_CAP;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health_handler))
        .route("/status", get(crate::http::status_handler))
        .route("/tickets", post(crate::http::create_ticket_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
