//! Boundary to the external chat transport library (§2A, §9).
//!
//! The underlying chat client (WhatsApp, or any other transport) is an
//! external dependency this workspace does not vendor. Everything above
//! this trait — filters, outbound policy, the connection state machine —
//! is written against [`ChatTransport`] so a concrete adapter can be
//! plugged in without touching the rest of the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use triagebot_core::types::{MediaDescriptor, MessageKind};

/// A raw event surfaced by the transport, before gateway normalization.
#[derive(Debug, Clone)]
pub enum RawEvent {
    Message(RawMessage),
    ConnectionUpdate(ConnectionUpdate),
}

#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub sender_id: String,
    pub conversation_id: String,
    pub is_group: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub from_self: bool,
    pub is_notify: bool,
    pub text: String,
    pub kind: MessageKind,
    pub media_ref: Option<MediaRef>,
    pub caption: Option<String>,
    pub quoted: Option<RawQuoted>,
    pub mentions: Vec<String>,
    pub forwarded: bool,
    pub is_live_location: bool,
}

#[derive(Debug, Clone)]
pub struct RawQuoted {
    pub id: String,
    pub text: String,
    pub author: String,
}

/// A reference to undownloaded media; the transport fetches the bytes on demand.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub kind: MessageKind,
    pub mime: String,
    pub size_bytes: u64,
}

/// Transport connection lifecycle events (§4.1 connection state machine).
#[derive(Debug, Clone)]
pub enum ConnectionUpdate {
    QrCode(String),
    Open,
    Close { status_code: Option<u16>, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub remote_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportSendError {
    #[error("invalid destination")]
    InvalidNumber,
    #[error("sender is blocked by recipient")]
    Blocked,
    #[error("recipient not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limited by transport")]
    RateLimited,
    #[error("transport queue overflow")]
    QueueOverflow,
    #[error("transient transport error: {0}")]
    Transient(String),
}

impl TransportSendError {
    /// §4.1 step 6: a fixed set of terminal reasons is non-retryable;
    /// everything else goes through the exponential-backoff retry queue.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportSendError::Transient(_))
    }
}

/// A downloaded media payload, ready to be written under the media root.
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Everything the gateway needs from the underlying chat client.
///
/// Implementations own the actual socket/session and are expected to push
/// [`RawEvent`]s onto the channel handed to [`ChatTransport::run`] — see the
/// module doc on why this crate does not vendor one.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start the transport's event loop, forwarding every event onto `events`
    /// until `shutdown` fires. Implementations are responsible for the
    /// reconnect-retry loop driven by the connection state machine in
    /// [`crate::connection`]; this method returns once fully shut down.
    async fn run(
        &self,
        events: tokio::sync::mpsc::Sender<RawEvent>,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()>;

    /// Download the bytes referenced by a [`MediaRef`] carried on a
    /// [`RawMessage`]. Best-effort: callers treat an `Err` as "download
    /// failed", not fatal (§4.1 step 2).
    async fn download_media(&self, media_ref: &MediaRef) -> anyhow::Result<DownloadedMedia>;

    /// Send a text message, returning the transport's own message id.
    async fn send_text(
        &self,
        destination: &str,
        body: &str,
        quoted_message_id: Option<&str>,
        mentions: &[String],
    ) -> Result<SendResult, TransportSendError>;

    /// Send a media message whose bytes already live at `local_path`.
    async fn send_media(
        &self,
        destination: &str,
        local_path: &str,
        caption: Option<&str>,
    ) -> Result<SendResult, TransportSendError>;
}
