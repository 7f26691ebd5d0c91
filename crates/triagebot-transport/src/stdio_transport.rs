//! A line-oriented stdin/stdout [`ChatTransport`], used for local
//! development and the integration checks in this workspace until a real
//! chat-library adapter is wired in behind the trait. Every line read from
//! stdin becomes an inbound text message from a fixed operator identity;
//! every send is printed to stdout.

use std::io::Write as _;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::info;

use triagebot_core::types::MessageKind;

use crate::chat_transport::{
    ChatTransport, ConnectionUpdate, DownloadedMedia, MediaRef, RawEvent, RawMessage, SendResult,
    TransportSendError,
};

pub struct StdioTransport {
    operator_id: String,
    conversation_id: String,
}

impl StdioTransport {
    pub fn new(operator_id: String, conversation_id: String) -> Self {
        Self {
            operator_id,
            conversation_id,
        }
    }
}

#[async_trait]
impl ChatTransport for StdioTransport {
    async fn run(&self, events: Sender<RawEvent>, shutdown: CancellationToken) -> anyhow::Result<()> {
        events.send(RawEvent::ConnectionUpdate(ConnectionUpdate::Open)).await.ok();
        info!("stdio transport connected (reading inbound messages from stdin)");

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    events
                        .send(RawEvent::ConnectionUpdate(ConnectionUpdate::Close {
                            status_code: None,
                            reason: "shutdown".to_string(),
                        }))
                        .await
                        .ok();
                    return Ok(());
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(());
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let msg = RawMessage {
                        id: uuid::Uuid::now_v7().to_string(),
                        sender_id: self.operator_id.clone(),
                        conversation_id: self.conversation_id.clone(),
                        is_group: false,
                        timestamp: chrono::Utc::now(),
                        from_self: false,
                        is_notify: true,
                        text: line,
                        kind: MessageKind::Text,
                        media_ref: None,
                        caption: None,
                        quoted: None,
                        mentions: vec![],
                        forwarded: false,
                        is_live_location: false,
                    };
                    if events.send(RawEvent::Message(msg)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn download_media(&self, _media_ref: &MediaRef) -> anyhow::Result<DownloadedMedia> {
        anyhow::bail!("stdio transport carries no media")
    }

    async fn send_text(
        &self,
        destination: &str,
        body: &str,
        quoted_message_id: Option<&str>,
        _mentions: &[String],
    ) -> Result<SendResult, TransportSendError> {
        let mut stdout = std::io::stdout();
        let quoted = quoted_message_id.map(|q| format!(" (re: {q})")).unwrap_or_default();
        writeln!(stdout, "[send -> {destination}]{quoted} {body}")
            .map_err(|e| TransportSendError::Transient(e.to_string()))?;
        Ok(SendResult {
            remote_id: uuid::Uuid::now_v7().to_string(),
        })
    }

    async fn send_media(
        &self,
        destination: &str,
        local_path: &str,
        caption: Option<&str>,
    ) -> Result<SendResult, TransportSendError> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "[send-media -> {destination}] {local_path} ({caption:?})")
            .map_err(|e| TransportSendError::Transient(e.to_string()))?;
        Ok(SendResult {
            remote_id: uuid::Uuid::now_v7().to_string(),
        })
    }
}
