//! Outbound pipeline (§4.1): priority queue, per-destination rate limit,
//! scheduled-at parking, destination validation, template substitution, and
//! the exponential-backoff retry queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use triagebot_core::backoff::exponential_delay;
use triagebot_core::cache::SlidingWindowLimiter;
use triagebot_core::identity::{normalize_destination, validate_destination};
use triagebot_core::types::{OutboundBody, OutboundCommand, Priority, RetryAttempt};

use crate::chat_transport::{ChatTransport, SendResult, TransportSendError};

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(30);

/// Substitute `{{variable}}` placeholders in `body` using `template`'s
/// bindings. Idempotent: a template already marked `applied` is returned
/// unchanged (§8: substitution must not double-apply on redelivery).
pub fn apply_template(mut command: OutboundCommand) -> OutboundCommand {
    let Some(template) = command.template.as_mut() else {
        return command;
    };
    if template.applied {
        return command;
    }

    if let OutboundBody::Text(text) = &mut command.body {
        let mut rendered = text.clone();
        for (key, value) in &template.variables {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        *text = rendered;
    }

    command.template.as_mut().unwrap().applied = true;
    command
}

struct QueueInner {
    items: VecDeque<OutboundCommand>,
    /// Number of `High` items currently sitting at the front of `items`, i.e.
    /// the insertion point for the next `High` arrival. Keeping this instead
    /// of push_front-ing every High item is what keeps each priority class
    /// FIFO among itself (§5).
    high_count: usize,
    cap: usize,
}

/// Priority queue of outbound commands, draining high-priority items ahead
/// of normal ones, capped with oldest-drop on overflow (§4.1).
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                high_count: 0,
                cap,
            }),
            notify: Notify::new(),
        }
    }

    /// Returns `true` if enqueued, `false` if an item had to be dropped on
    /// overflow (the caller should emit a failure notification in that case).
    pub async fn push(&self, command: OutboundCommand) -> bool {
        let mut inner = self.inner.lock().await;
        match command.priority {
            Priority::High => {
                let at = inner.high_count;
                inner.items.insert(at, command);
                inner.high_count += 1;
            }
            Priority::Normal => inner.items.push_back(command),
        }

        let overflowed = if inner.items.len() > inner.cap {
            if let Some(dropped) = inner.items.pop_back() {
                if dropped.priority == Priority::High {
                    inner.high_count = inner.high_count.saturating_sub(1);
                }
            }
            true
        } else {
            false
        };
        drop(inner);
        self.notify.notify_one();
        !overflowed
    }

    pub async fn pop(&self) -> Option<OutboundCommand> {
        let mut inner = self.inner.lock().await;
        let item = inner.items.pop_front();
        if let Some(command) = &item {
            if command.priority == Priority::High {
                inner.high_count = inner.high_count.saturating_sub(1);
            }
        }
        item
    }

    pub async fn wait_for_item(&self) {
        self.notify.notified().await;
    }
}

/// Outcome of processing a single command once past the queue.
pub enum OutboundOutcome {
    Sent(SendResult),
    Rejected(String),
    Retrying { delay: Duration },
    FinalFailure(String),
}

/// Process one command through the rate limit, scheduling, validation,
/// templating, and send steps (§4.1 outbound steps 1-6). Returns `None` if
/// the command was parked for its `scheduled_at` time and should be
/// re-enqueued by the caller once that time arrives.
pub async fn process_command(
    transport: &dyn ChatTransport,
    rate_limiter: &Mutex<SlidingWindowLimiter<String>>,
    mut command: OutboundCommand,
    max_attempts: u32,
) -> Option<OutboundOutcome> {
    if let Some(scheduled_at) = command.scheduled_at {
        if scheduled_at > Utc::now() {
            return None;
        }
    }

    {
        let mut limiter = rate_limiter.lock().await;
        if !limiter.try_acquire(command.destination.clone(), std::time::Instant::now()) {
            return Some(OutboundOutcome::Rejected("per-destination rate limit exceeded".to_string()));
        }
    }

    let normalized = normalize_destination(&command.destination);
    if !validate_destination(&normalized) {
        return Some(OutboundOutcome::Rejected(format!(
            "invalid destination syntax: {}",
            command.destination
        )));
    }
    command.destination = normalized;
    command = apply_template(command);

    let send_result = match &command.body {
        OutboundBody::Text(text) => {
            transport
                .send_text(
                    &command.destination,
                    text,
                    command.quoted_message_id.as_deref(),
                    &command.mentions,
                )
                .await
        }
        OutboundBody::Media(media) => {
            let path = media.local_path.as_deref().unwrap_or_default();
            transport
                .send_media(&command.destination, path, None)
                .await
        }
    };

    match send_result {
        Ok(result) => {
            info!(destination = %command.destination, "outbound command sent");
            Some(OutboundOutcome::Sent(result))
        }
        Err(e) if !e.is_retryable() => {
            warn!(destination = %command.destination, error = %e, "outbound command failed, non-retryable");
            Some(OutboundOutcome::Rejected(e.to_string()))
        }
        Err(e) => {
            warn!(destination = %command.destination, error = %e, attempt = command.retry_count, "outbound send failed, will retry");
            if command.retry_count + 1 >= max_attempts {
                Some(OutboundOutcome::FinalFailure(e.to_string()))
            } else {
                let delay = exponential_delay(RETRY_BASE, command.retry_count, RETRY_CAP);
                Some(OutboundOutcome::Retrying { delay })
            }
        }
    }
}

/// Record a failed attempt on `command`, ready for re-enqueue into the
/// retry queue with its attempt count and history updated.
pub fn record_retry_attempt(mut command: OutboundCommand, error: TransportSendError) -> OutboundCommand {
    command.retry_count += 1;
    command.retry_history.push(RetryAttempt {
        attempt: command.retry_count,
        error: error.to_string(),
        at: Utc::now(),
    });
    command
}

/// Shared handle used by both the immediate-dispatch loop and the 5 s retry
/// sweep (§4.1).
pub struct RetryQueue {
    items: Mutex<Vec<(std::time::Instant, OutboundCommand)>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }

    pub async fn schedule(&self, command: OutboundCommand, delay: Duration) {
        let ready_at = std::time::Instant::now() + delay;
        self.items.lock().await.push((ready_at, command));
    }

    /// Drain every entry whose delay has elapsed. Called by the 5 s sweep.
    pub async fn drain_ready(&self) -> Vec<OutboundCommand> {
        let now = std::time::Instant::now();
        let mut items = self.items.lock().await;
        let (ready, pending): (Vec<_>, Vec<_>) = items.drain(..).partition(|(at, _)| *at <= now);
        *items = pending;
        ready.into_iter().map(|(_, cmd)| cmd).collect()
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedOutboundQueue = Arc<OutboundQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn text_command(destination: &str, text: &str, priority: Priority) -> OutboundCommand {
        OutboundCommand {
            id: "c1".to_string(),
            destination: destination.to_string(),
            body: OutboundBody::Text(text.to_string()),
            mentions: vec![],
            quoted_message_id: None,
            priority,
            scheduled_at: None,
            template: None,
            retry_count: 0,
            retry_history: vec![],
        }
    }

    #[tokio::test]
    async fn queue_drains_high_priority_before_normal() {
        let queue = OutboundQueue::new(10);
        queue.push(text_command("a", "1", Priority::Normal)).await;
        queue.push(text_command("b", "2", Priority::High)).await;

        let first = queue.pop().await.unwrap();
        assert_eq!(first.destination, "b");
    }

    #[tokio::test]
    async fn high_priority_items_drain_fifo_among_themselves() {
        let queue = OutboundQueue::new(10);
        queue.push(text_command("h1", "1", Priority::High)).await;
        queue.push(text_command("h2", "2", Priority::High)).await;

        let first = queue.pop().await.unwrap();
        let second = queue.pop().await.unwrap();
        assert_eq!(first.destination, "h1");
        assert_eq!(second.destination, "h2");
    }

    #[tokio::test]
    async fn queue_drops_oldest_on_overflow() {
        let queue = OutboundQueue::new(1);
        assert!(queue.push(text_command("a", "1", Priority::Normal)).await);
        assert!(!queue.push(text_command("b", "2", Priority::Normal)).await);
    }

    #[test]
    fn template_substitution_replaces_placeholders_once() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Ana".to_string());
        let mut command = text_command("d", "Hola {{name}}, tu ticket fue creado", Priority::Normal);
        command.template = Some(triagebot_core::types::TemplateRef {
            name: "greeting".to_string(),
            variables: vars,
            applied: false,
        });

        let applied = apply_template(command);
        match &applied.body {
            OutboundBody::Text(t) => assert_eq!(t, "Hola Ana, tu ticket fue creado"),
            _ => panic!("expected text body"),
        }
        assert!(applied.template.unwrap().applied);
    }

    #[test]
    fn template_substitution_is_idempotent() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Ana".to_string());
        let mut command = text_command("d", "already rendered", Priority::Normal);
        command.template = Some(triagebot_core::types::TemplateRef {
            name: "greeting".to_string(),
            variables: vars,
            applied: true,
        });

        let applied = apply_template(command.clone());
        match (&applied.body, &command.body) {
            (OutboundBody::Text(a), OutboundBody::Text(b)) => assert_eq!(a, b),
            _ => panic!("expected text body"),
        }
    }

    #[tokio::test]
    async fn retry_queue_only_drains_ready_items() {
        let retry = RetryQueue::new();
        retry.schedule(text_command("a", "1", Priority::Normal), Duration::from_secs(0)).await;
        retry.schedule(text_command("b", "2", Priority::Normal), Duration::from_secs(60)).await;

        let drained = retry.drain_ready().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].destination, "a");
    }
}
