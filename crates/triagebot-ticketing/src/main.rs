use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;
mod circuit_breaker;
mod config;
mod error;
mod fallback;
mod helpdesk;
mod http;
mod oauth;
mod pipeline;
mod reporter;

use app::AppState;
use config::TicketingConfig;
use oauth::OAuthStore;
use triagebot_bus::{topics, BusPublisher, PublishHandle, Store, SubscribeHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("TRIAGEBOT_TICKETING_CONFIG").ok();
    let config: TicketingConfig = triagebot_core::config::load_config(
        config_path.as_deref(),
        "TRIAGEBOT_TICKETING",
        "ticketing.toml",
    )
    .unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        TicketingConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("triagebot_ticketing={}", config.logging.level).into()),
        )
        .init();

    let shutdown = CancellationToken::new();

    let store = Store::connect(&config.bus.url).await?;
    let publish_handle = PublishHandle::connect(&config.bus.url).await?;
    let create_subscribe_handle = SubscribeHandle::new(&config.bus.url)?;
    let update_subscribe_handle = SubscribeHandle::new(&config.bus.url)?;
    let publisher = BusPublisher::new(publish_handle, app::PUBLISHER_QUEUE_CAP);

    let oauth = Arc::new(OAuthStore::open(&config.ticketing.oauth_db_path)?);

    let sweep_interval = Duration::from_secs(config.ticketing.fallback_sweep_interval_secs);

    let bind = config.admin.bind.clone();
    let port = config.admin.port;
    let state = AppState::new(config, store, publisher, oauth, shutdown.clone());

    let publisher_task = {
        let publisher = state.publisher.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { publisher.run(shutdown).await })
    };

    let create_task = {
        let state = state.clone();
        let channel = topics::namespaced(&state.bus_namespace, topics::TICKET_CREATE_REQUEST);
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { run_create_loop(state, create_subscribe_handle, channel, shutdown).await })
    };

    let update_task = {
        let state = state.clone();
        let channel = topics::namespaced(&state.bus_namespace, topics::TICKET_UPDATE_REQUEST);
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { run_update_loop(state, update_subscribe_handle, channel, shutdown).await })
    };

    let sweep_task = {
        let state = state.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            triagebot_core::worker::run_periodic("fallback-queue-sweep", sweep_interval, shutdown, || {
                let state = state.clone();
                async move { pipeline::sweep_fallback_queue(&state).await }
            })
            .await
        })
    };

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("triagebot-ticketing listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server_shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = publisher_task.await;
    let _ = create_task.await;
    let _ = update_task.await;
    let _ = sweep_task.await;

    Ok(())
}

/// Drive the `ticket:create:request` subscription, dispatching each payload
/// to [`pipeline::handle_create_request`]. Re-subscribes transparently if
/// the underlying stream ends (mirrors the other two services' inbound
/// loops).
async fn run_create_loop(
    state: Arc<AppState>,
    subscribe_handle: SubscribeHandle,
    channel: String,
    shutdown: CancellationToken,
) {
    let mut subscription = match subscribe_handle.subscribe(&channel).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, channel, "failed to subscribe");
            return;
        }
    };

    loop {
        let payload = tokio::select! {
            payload = subscription.next_payload() => payload,
            _ = shutdown.cancelled() => {
                info!(channel, "subscribe loop shutting down");
                return;
            }
        };

        let Some(payload) = payload else {
            warn!(channel, "subscription stream ended, retrying subscribe");
            match subscribe_handle.subscribe(&channel).await {
                Ok(s) => subscription = s,
                Err(e) => {
                    error!(error = %e, channel, "failed to re-subscribe");
                    return;
                }
            }
            continue;
        };

        let state = state.clone();
        tokio::spawn(async move { pipeline::handle_create_request(&state, &payload).await });
    }
}

/// Drive the `ticket:update:request` subscription, dispatching each payload
/// to [`pipeline::handle_update_request`].
async fn run_update_loop(
    state: Arc<AppState>,
    subscribe_handle: SubscribeHandle,
    channel: String,
    shutdown: CancellationToken,
) {
    let mut subscription = match subscribe_handle.subscribe(&channel).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, channel, "failed to subscribe");
            return;
        }
    };

    loop {
        let payload = tokio::select! {
            payload = subscription.next_payload() => payload,
            _ = shutdown.cancelled() => {
                info!(channel, "subscribe loop shutting down");
                return;
            }
        };

        let Some(payload) = payload else {
            warn!(channel, "subscription stream ended, retrying subscribe");
            match subscribe_handle.subscribe(&channel).await {
                Ok(s) => subscription = s,
                Err(e) => {
                    error!(error = %e, channel, "failed to re-subscribe");
                    return;
                }
            }
            continue;
        };

        let state = state.clone();
        tokio::spawn(async move { pipeline::handle_update_request(&state, &payload).await });
    }
}
