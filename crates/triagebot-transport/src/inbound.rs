//! Inbound pipeline (§4.1 steps 1-6): normalize a raw transport event into
//! an [`InboundMessage`], run it through the filter chain, tag priority,
//! publish it, and append it to the dated message log.

use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use triagebot_bus::{topics, BusPublisher};
use triagebot_core::types::{InboundMessage, Priority, QuotedMessage};

use crate::chat_transport::{ChatTransport, RawMessage};
use crate::filters::{self, FilterOutcome, InboundFilters};
use crate::media;
use crate::message_log::{Direction, LogEntryFields, MessageLog};

pub struct InboundPipeline {
    filters: Mutex<InboundFilters>,
    publisher: BusPublisher,
    bus_namespace: String,
    media_root: String,
    log: MessageLog,
}

impl InboundPipeline {
    pub fn new(
        publisher: BusPublisher,
        bus_namespace: String,
        media_root: String,
        log: MessageLog,
        dedup_capacity: usize,
        rate_window: std::time::Duration,
        rate_max: u32,
    ) -> Self {
        Self {
            filters: Mutex::new(InboundFilters::new(dedup_capacity, rate_window, rate_max)),
            publisher,
            bus_namespace,
            media_root,
            log,
        }
    }

    /// Handle one raw inbound message: steps 1-6 of §4.1.
    pub async fn handle(&self, transport: &dyn ChatTransport, raw: RawMessage, self_id: &str) {
        // Step 1: drop self-authored messages and non-notify events.
        if raw.from_self || raw.sender_id == self_id || !raw.is_notify {
            debug!(message_id = %raw.id, "dropping self-authored or non-notify event");
            return;
        }

        // Step 2: normalize, downloading media best-effort.
        let media = match &raw.media_ref {
            Some(media_ref) => Some(
                media::download_and_store(transport, &self.media_root, &raw.id, raw.timestamp, media_ref).await,
            ),
            None => None,
        };

        let quoted = raw.quoted.as_ref().map(|q| QuotedMessage {
            id: q.id.clone(),
            text: q.text.clone(),
            author: q.author.clone(),
        });

        let priority = filters::tag_priority(raw.is_live_location, &raw.text, raw.is_group, &raw.mentions);

        // §3 gives every normalized message its own id, distinct from the
        // transport's own message id, so downstream dedup/threading keys
        // never collide with a replayed transport id.
        let msg = InboundMessage {
            id: format!("{}:{}", Uuid::now_v7(), raw.id),
            sender_id: raw.sender_id.clone(),
            conversation_id: raw.conversation_id.clone(),
            is_group: raw.is_group,
            timestamp: raw.timestamp,
            transport: "whatsapp".to_string(),
            text: raw.text.clone(),
            kind: raw.kind,
            media,
            caption: raw.caption.clone(),
            quoted,
            mentions: raw.mentions.clone(),
            forwarded: raw.forwarded,
            priority,
        };

        // Step 3: filter chain.
        let outcome = {
            let mut filters = self.filters.lock().await;
            filters.check(&msg, Instant::now())
        };
        match outcome {
            FilterOutcome::DuplicateDropped => {
                debug!(message_id = %msg.id, "dropped duplicate message");
                return;
            }
            FilterOutcome::RateLimited => {
                debug!(sender = %msg.sender_id, "dropped message over per-sender rate limit");
                return;
            }
            FilterOutcome::Pass => {}
        }

        if filters::is_spam_suspicious(&msg.text) {
            tracing::warn!(message_id = %msg.id, "message matched multiple spam keywords");
        }

        // Step 5: publish.
        let channel = topics::namespaced(&self.bus_namespace, topics::MESSAGES_INBOUND);
        match serde_json::to_string(&msg) {
            Ok(payload) => self.publisher.publish(&channel, payload, msg.priority).await,
            Err(e) => tracing::warn!(error = %e, "failed to serialize inbound message"),
        }

        // Step 6: message log.
        self.log_message(&msg).await;

        info!(message_id = %msg.id, sender = %msg.sender_id, "processed inbound message");
    }

    async fn log_message(&self, msg: &InboundMessage) {
        let fields = LogEntryFields {
            priority: Some(priority_label(msg.priority).to_string()),
            content: Some(msg.text.clone()),
            media_type: msg.media.as_ref().map(|m| m.mime.clone()),
            media_caption: msg.caption.clone(),
            status: None,
            error: None,
        };
        if let Err(e) = self
            .log
            .append(Utc::now(), Direction::Inbound, &msg.sender_id, &msg.id, kind_label(msg.kind), fields)
            .await
        {
            tracing::warn!(error = %e, "failed to write message log entry");
        }
    }
}

fn priority_label(p: Priority) -> &'static str {
    match p {
        Priority::High => "high",
        Priority::Normal => "normal",
    }
}

fn kind_label(kind: triagebot_core::types::MessageKind) -> &'static str {
    use triagebot_core::types::MessageKind::*;
    match kind {
        Text => "text",
        Image => "image",
        Video => "video",
        Audio => "audio",
        Document => "document",
        Sticker => "sticker",
        Location => "location",
        Contact => "contact",
        Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_labels_match_wire_vocabulary() {
        assert_eq!(priority_label(Priority::High), "high");
        assert_eq!(priority_label(Priority::Normal), "normal");
    }
}
