use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;
mod config;
mod consensus;
mod fallback;
mod http;
mod pipeline;
mod threading;

use app::AppState;
use config::ClassifierConfig;
use triagebot_bus::{topics, BusPublisher, PublishHandle, Store, SubscribeHandle};
use triagebot_llm::{AnthropicProvider, ClassifierProvider, OpenAiProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("TRIAGEBOT_CLASSIFIER_CONFIG").ok();
    let config: ClassifierConfig = triagebot_core::config::load_config(
        config_path.as_deref(),
        "TRIAGEBOT_CLASSIFIER",
        "classifier.toml",
    )
    .unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        ClassifierConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("triagebot_classifier={}", config.logging.level).into()),
        )
        .init();

    let shutdown = CancellationToken::new();

    let store = Store::connect(&config.bus.url).await?;
    let publish_handle = PublishHandle::connect(&config.bus.url).await?;
    let subscribe_handle = SubscribeHandle::new(&config.bus.url)?;
    let publisher = BusPublisher::new(publish_handle, app::PUBLISHER_QUEUE_CAP);

    let primary: Box<dyn ClassifierProvider> = Box::new(AnthropicProvider::new(
        config.classifier.anthropic_api_key.clone().unwrap_or_default(),
        None,
    ));
    let secondary: Box<dyn ClassifierProvider> = Box::new(OpenAiProvider::new(
        config.classifier.openai_api_key.clone().unwrap_or_default(),
        None,
    ));

    let bind = config.admin.bind.clone();
    let port = config.admin.port;
    let state = AppState::new(config, store, publisher, primary, secondary, shutdown.clone());

    let publisher_task = {
        let publisher = state.publisher.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { publisher.run(shutdown).await })
    };

    let inbound_task = {
        let state = state.clone();
        let channel = topics::namespaced(&state.bus_namespace, topics::MESSAGES_INBOUND);
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { run_inbound_loop(state, subscribe_handle, channel, shutdown).await })
    };

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("triagebot-classifier listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server_shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = publisher_task.await;
    let _ = inbound_task.await;

    Ok(())
}

async fn run_inbound_loop(
    state: std::sync::Arc<AppState>,
    subscribe_handle: SubscribeHandle,
    channel: String,
    shutdown: CancellationToken,
) {
    let mut subscription = match subscribe_handle.subscribe(&channel).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, channel, "failed to subscribe to inbound messages channel");
            return;
        }
    };

    loop {
        let payload = tokio::select! {
            payload = subscription.next_payload() => payload,
            _ = shutdown.cancelled() => {
                info!("inbound loop shutting down");
                return;
            }
        };

        let Some(payload) = payload else {
            warn!("inbound subscription stream ended, retrying subscribe");
            match subscribe_handle.subscribe(&channel).await {
                Ok(s) => subscription = s,
                Err(e) => {
                    error!(error = %e, "failed to re-subscribe to inbound messages channel");
                    return;
                }
            }
            continue;
        };

        match serde_json::from_str::<triagebot_core::types::InboundMessage>(&payload) {
            Ok(msg) => {
                let state = state.clone();
                tokio::spawn(async move { pipeline::handle_inbound(&state, msg).await });
            }
            Err(e) => warn!(error = %e, "dropping malformed inbound message payload"),
        }
    }
}
