use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;
mod chat_transport;
mod config;
mod connection;
mod filters;
mod http;
mod inbound;
mod media;
mod message_log;
mod outbound;
mod session;
mod stdio_transport;

use app::AppState;
use chat_transport::{ChatTransport, RawEvent};
use config::TransportConfig;
use connection::ConnectionStateMachine;
use inbound::InboundPipeline;
use message_log::MessageLog;
use outbound::{process_command, record_retry_attempt, OutboundOutcome, RetryQueue};
use stdio_transport::StdioTransport;
use triagebot_bus::{BusPublisher, PublishHandle, Store};
use triagebot_core::cache::SlidingWindowLimiter;

const RETRY_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("TRIAGEBOT_TRANSPORT_CONFIG").ok();
    let config: TransportConfig = triagebot_core::config::load_config(
        config_path.as_deref(),
        "TRIAGEBOT_TRANSPORT",
        "transport.toml",
    )
    .unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        TransportConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("triagebot_transport={}", config.logging.level).into()),
        )
        .init();

    let shutdown = CancellationToken::new();

    let store = Store::connect(&config.bus.url).await?;
    let publish_handle = PublishHandle::connect(&config.bus.url).await?;
    let publisher = BusPublisher::new(publish_handle, app::PUBLISHER_QUEUE_CAP);

    let transport: Box<dyn ChatTransport> = Box::new(StdioTransport::new(
        "operator".to_string(),
        "operator@s.whatsapp.net".to_string(),
    ));

    let bind = config.admin.bind.clone();
    let port = config.admin.port;
    let transport_settings = config.transport.clone();
    let state = AppState::new(config, store, publisher, transport, shutdown.clone());

    let log = MessageLog::new(transport_settings.message_log_dir.clone());
    let inbound_pipeline = Arc::new(InboundPipeline::new(
        state.publisher.clone(),
        state.bus_namespace.clone(),
        transport_settings.media_root.clone(),
        log,
        4_096,
        Duration::from_secs(60),
        transport_settings.outbound_rate_max.max(1),
    ));

    let publisher_task = {
        let publisher = state.publisher.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { publisher.run(shutdown).await })
    };

    let event_loop_task = {
        let state = state.clone();
        let pipeline = inbound_pipeline.clone();
        let self_id = transport_settings.self_id.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { run_event_loop(state, pipeline, self_id, shutdown).await })
    };

    let outbound_task = {
        let state = state.clone();
        let settings = transport_settings.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move { run_outbound_loop(state, settings, shutdown).await })
    };

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("triagebot-transport listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server_shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = publisher_task.await;
    let _ = event_loop_task.await;
    let _ = outbound_task.await;

    Ok(())
}

/// Drive the transport's event stream: connection updates feed the state
/// machine, messages feed the inbound pipeline.
///
/// The critical re-binding invariant (§4.1): `transport` is read once from
/// `state` and held for the lifetime of this loop, so every inbound event
/// and every outbound send in this process goes through the *same* handle
/// the transport handed back on (re)connect — there is no second path by
/// which a stale reference could be distributed.
async fn run_event_loop(
    state: Arc<AppState>,
    pipeline: Arc<InboundPipeline>,
    self_id: String,
    shutdown: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<RawEvent>(256);
    let mut state_machine = ConnectionStateMachine::new();

    let run_shutdown = shutdown.clone();
    let transport_ref: &dyn ChatTransport = state.transport.as_ref();
    let run_future = transport_ref.run(tx, run_shutdown);
    tokio::pin!(run_future);

    loop {
        tokio::select! {
            result = &mut run_future => {
                if let Err(e) = result {
                    error!(error = %e, "chat transport run loop exited with error");
                }
                return;
            }
            event = rx.recv() => {
                match event {
                    Some(RawEvent::Message(raw)) => {
                        pipeline.handle(state.transport.as_ref(), raw, &self_id).await;
                    }
                    Some(RawEvent::ConnectionUpdate(update)) => {
                        handle_connection_update(&state, &mut state_machine, update).await;
                    }
                    None => {
                        warn!("transport event stream closed");
                        return;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                return;
            }
        }
    }
}

async fn handle_connection_update(
    state: &Arc<AppState>,
    state_machine: &mut ConnectionStateMachine,
    update: chat_transport::ConnectionUpdate,
) {
    match update {
        chat_transport::ConnectionUpdate::QrCode(_) => {
            state_machine.on_qr();
            info!("QR code issued, awaiting operator scan");
        }
        chat_transport::ConnectionUpdate::Open => {
            state_machine.on_open();
            state.set_connected(true);
            info!("transport connection established");
            if let Err(e) = state.sessions.backup() {
                warn!(error = %e, "session backup on connect failed");
            }
        }
        chat_transport::ConnectionUpdate::Close { status_code, reason } => {
            state.set_connected(false);
            match state_machine.on_close(status_code) {
                Some(delay) => {
                    warn!(?status_code, reason, delay_ms = delay.as_millis() as u64, "connection closed, will reconnect");
                    state_machine.on_reconnect_attempt();
                }
                None => {
                    error!(?status_code, reason, "connection closed permanently, terminating");
                }
            }
        }
    }
}

async fn run_outbound_loop(state: Arc<AppState>, settings: config::TransportSettings, shutdown: CancellationToken) {
    let rate_limiter: Arc<Mutex<SlidingWindowLimiter<String>>> = Arc::new(Mutex::new(SlidingWindowLimiter::new(
        Duration::from_secs(settings.outbound_rate_window_secs),
        settings.outbound_rate_max,
    )));
    let retry_queue = Arc::new(RetryQueue::new());

    let sweep_state = state.clone();
    let sweep_retry = retry_queue.clone();
    let sweep_shutdown = shutdown.clone();
    tokio::spawn(async move {
        triagebot_core::worker::run_periodic(
            "outbound-retry-sweep",
            RETRY_SWEEP_INTERVAL,
            sweep_shutdown,
            || {
                let state = sweep_state.clone();
                let retry_queue = sweep_retry.clone();
                async move {
                    for command in retry_queue.drain_ready().await {
                        sweep_state.outbound_queue.push(command).await;
                    }
                    Ok::<(), std::convert::Infallible>(())
                }
            },
        )
        .await;
        let _ = &state;
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            command = state.outbound_queue.pop() => {
                let Some(command) = command else {
                    tokio::select! {
                        _ = state.outbound_queue.wait_for_item() => continue,
                        _ = shutdown.cancelled() => return,
                    }
                };

                let max_attempts = settings.retry_max_attempts;
                let destination = command.destination.clone();
                let outcome = process_command(state.transport.as_ref(), &rate_limiter, command.clone(), max_attempts).await;

                match outcome {
                    None => {
                        // Parked for scheduled_at; re-enqueue for a later sweep.
                        retry_queue.schedule(command, Duration::from_secs(1)).await;
                    }
                    Some(OutboundOutcome::Sent(_)) => {}
                    Some(OutboundOutcome::Rejected(reason)) => {
                        warn!(destination, reason, "outbound command rejected");
                    }
                    Some(OutboundOutcome::Retrying { delay }) => {
                        let failed = record_retry_attempt(
                            command,
                            chat_transport::TransportSendError::Transient("send failed".to_string()),
                        );
                        retry_queue.schedule(failed, delay).await;
                    }
                    Some(OutboundOutcome::FinalFailure(reason)) => {
                        warn!(destination, reason, "outbound command failed permanently");
                    }
                }
            }
        }
    }
}
