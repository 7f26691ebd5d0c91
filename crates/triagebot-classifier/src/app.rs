use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;

use triagebot_bus::{BusPublisher, Store};
use triagebot_core::config::BUS_PUBLISHER_QUEUE_CAP;
use triagebot_llm::ClassifierProvider;

use crate::config::ClassifierConfig;

/// Shared state handed to every Axum handler and to the inbound subscriber
/// loop.
pub struct AppState {
    pub config: ClassifierConfig,
    pub settings: crate::config::ClassifierSettings,
    pub bus_namespace: String,
    pub store: Store,
    pub publisher: BusPublisher,
    pub primary: Box<dyn ClassifierProvider>,
    pub secondary: Box<dyn ClassifierProvider>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: ClassifierConfig,
        store: Store,
        publisher: BusPublisher,
        primary: Box<dyn ClassifierProvider>,
        secondary: Box<dyn ClassifierProvider>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus_namespace: config.bus.namespace.clone(),
            settings: config.classifier.clone(),
            store,
            publisher,
            primary,
            secondary,
            shutdown,
            config,
        })
    }
}

/// Publisher queue capacity used when constructing the [`BusPublisher`] in `main.rs`.
pub const PUBLISHER_QUEUE_CAP: usize = BUS_PUBLISHER_QUEUE_CAP;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health_handler))
        .route("/status", get(crate::http::status_handler))
        .route("/classify", post(crate::http::classify_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
