use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;

use triagebot_bus::{BusPublisher, Store};
use triagebot_core::config::BUS_PUBLISHER_QUEUE_CAP;

use crate::chat_transport::ChatTransport;
use crate::config::TransportConfig;
use crate::outbound::OutboundQueue;
use crate::session::SessionStore;

pub struct AppState {
    pub config: TransportConfig,
    pub bus_namespace: String,
    pub store: Store,
    pub publisher: BusPublisher,
    pub transport: Box<dyn ChatTransport>,
    pub outbound_queue: Arc<OutboundQueue>,
    pub sessions: SessionStore,
    pub connected: AtomicBool,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: TransportConfig,
        store: Store,
        publisher: BusPublisher,
        transport: Box<dyn ChatTransport>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let outbound_queue = Arc::new(OutboundQueue::new(config.transport.outbound_queue_cap));
        let sessions = SessionStore::new(
            config.transport.session_dir.clone(),
            config.transport.session_backups_to_keep,
        );
        Arc::new(Self {
            bus_namespace: config.bus.namespace.clone(),
            store,
            publisher,
            transport,
            outbound_queue,
            sessions,
            connected: AtomicBool::new(false),
            shutdown,
            config,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

pub const PUBLISHER_QUEUE_CAP: usize = BUS_PUBLISHER_QUEUE_CAP;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health_handler))
        .route("/status", get(crate::http::status_handler))
        .route("/send", post(crate::http::send_handler))
        .route("/session", get(crate::http::session_handler))
        .route("/session/backup", post(crate::http::session_backup_handler))
        .route("/session/backups", get(crate::http::session_backups_handler))
        .route("/session/restore", post(crate::http::session_restore_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
