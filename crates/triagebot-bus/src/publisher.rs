//! Bus publisher (§4.1.2): an intermediate queue in front of every bus
//! `publish` call, so a transient Redis hiccup never blocks the caller.
//!
//! Items carry `{channel, payload, priority, retries, max_retries,
//! metadata}`. A background worker drains the queue strictly by priority
//! (all `High` ahead of any `Normal`, FIFO within a class — §5), retrying
//! failed publishes with exponential backoff before giving up.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use triagebot_core::types::Priority;

use crate::pubsub::PublishHandle;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PublishJob {
    pub channel: String,
    pub payload: String,
    pub priority: Priority,
    pub attempt: u32,
    pub max_attempts: u32,
    pub metadata: HashMap<String, String>,
}

/// Outcome of a single item in a [`BusPublisher::publish_batch`] call.
#[derive(Debug)]
pub struct BatchOutcome {
    pub channel: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// A `VecDeque` of jobs plus the insertion point for the next `High`
/// arrival, so repeated `High` enqueues stay FIFO among themselves instead
/// of each jumping ahead of the last (§5).
struct JobQueue {
    items: VecDeque<PublishJob>,
    high_count: usize,
}

impl JobQueue {
    fn new() -> Self {
        Self {
            items: VecDeque::new(),
            high_count: 0,
        }
    }

    fn push(&mut self, job: PublishJob) {
        match job.priority {
            Priority::High => {
                let at = self.high_count;
                self.items.insert(at, job);
                self.high_count += 1;
            }
            Priority::Normal => self.items.push_back(job),
        }
    }

    fn pop_front(&mut self) -> Option<PublishJob> {
        let item = self.items.pop_front();
        if let Some(job) = &item {
            if job.priority == Priority::High {
                self.high_count = self.high_count.saturating_sub(1);
            }
        }
        item
    }

    fn pop_back(&mut self) -> Option<PublishJob> {
        let item = self.items.pop_back();
        if let Some(job) = &item {
            if job.priority == Priority::High {
                self.high_count = self.high_count.saturating_sub(1);
            }
        }
        item
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

struct Inner {
    queue: Mutex<JobQueue>,
    notify: Notify,
    cap: usize,
}

/// Handle to the publisher's queue; cheap to clone, shared by every producer
/// in the process.
#[derive(Clone)]
pub struct BusPublisher {
    inner: Arc<Inner>,
    handle: PublishHandle,
}

impl BusPublisher {
    pub fn new(handle: PublishHandle, cap: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(JobQueue::new()),
                notify: Notify::new(),
                cap,
            }),
            handle,
        }
    }

    /// Enqueue a fire-and-forget publish. High-priority items are inserted
    /// ahead of any already-queued `Normal` item, but behind earlier `High`
    /// items, so each priority class stays FIFO among itself (§5). On
    /// overflow the oldest item is dropped and logged (§4.1.2, §7).
    pub async fn publish(&self, channel: &str, payload: String, priority: Priority) {
        let job = PublishJob {
            channel: channel.to_string(),
            payload,
            priority,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            metadata: HashMap::new(),
        };

        let mut queue = self.inner.queue.lock().await;
        queue.push(job);

        if queue.len() > self.inner.cap {
            if let Some(dropped) = queue.pop_back() {
                warn!(channel = %dropped.channel, "bus publisher queue overflow, dropping oldest item");
            }
        }
        drop(queue);
        self.inner.notify.notify_one();
    }

    /// Publish `items` directly (bypassing the background queue), returning
    /// a per-item success/failure outcome. Used where a caller needs to know
    /// immediately whether each item landed (e.g. admin endpoints).
    pub async fn publish_batch(&self, items: Vec<(String, String)>) -> Vec<BatchOutcome> {
        let mut out = Vec::with_capacity(items.len());
        for (channel, payload) in items {
            match self.handle.publish_raw(&channel, &payload).await {
                Ok(()) => out.push(BatchOutcome {
                    channel,
                    succeeded: true,
                    error: None,
                }),
                Err(e) => out.push(BatchOutcome {
                    channel,
                    succeeded: false,
                    error: Some(e.to_string()),
                }),
            }
        }
        out
    }

    /// Run the background drain loop until `shutdown` fires. On shutdown,
    /// the queue is drained (best-effort, one pass) before returning, per
    /// §5's graceful-shutdown requirement.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let job = {
                let mut queue = self.inner.queue.lock().await;
                queue.pop_front()
            };

            match job {
                Some(job) => self.process(job).await,
                None => {
                    if shutdown.is_cancelled() {
                        debug!("bus publisher queue drained, stopping");
                        return;
                    }
                    tokio::select! {
                        _ = self.inner.notify.notified() => {}
                        _ = shutdown.cancelled() => {
                            // One last drain pass to flush whatever arrived
                            // between the cancellation check and here.
                            self.drain_remaining().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn drain_remaining(&self) {
        loop {
            let job = {
                let mut queue = self.inner.queue.lock().await;
                queue.pop_front()
            };
            match job {
                Some(job) => self.process(job).await,
                None => return,
            }
        }
    }

    async fn process(&self, mut job: PublishJob) {
        match self.handle.publish_raw(&job.channel, &job.payload).await {
            Ok(()) => {}
            Err(e) => {
                job.attempt += 1;
                if job.attempt >= job.max_attempts {
                    warn!(
                        channel = %job.channel,
                        attempt = job.attempt,
                        error = %e,
                        "bus publish failed permanently, dropping"
                    );
                    return;
                }
                let delay = triagebot_core::backoff::exponential_delay(
                    BACKOFF_BASE,
                    job.attempt - 1,
                    BACKOFF_CAP,
                );
                warn!(
                    channel = %job.channel,
                    attempt = job.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "bus publish failed, retrying"
                );
                tokio::time::sleep(delay).await;

                let mut queue = self.inner.queue.lock().await;
                queue.push(job);
                drop(queue);
                self.inner.notify.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(channel: &str, priority: Priority) -> PublishJob {
        PublishJob {
            channel: channel.to_string(),
            payload: "{}".to_string(),
            priority,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn priority_ordering_places_high_ahead_of_normal() {
        let mut queue = JobQueue::new();
        queue.push(job("normal", Priority::Normal));
        queue.push(job("high", Priority::High));
        assert_eq!(queue.pop_front().unwrap().channel, "high");
        assert_eq!(queue.pop_front().unwrap().channel, "normal");
    }

    #[test]
    fn high_priority_jobs_drain_fifo_among_themselves() {
        let mut queue = JobQueue::new();
        queue.push(job("h1", Priority::High));
        queue.push(job("h2", Priority::High));
        assert_eq!(queue.pop_front().unwrap().channel, "h1");
        assert_eq!(queue.pop_front().unwrap().channel, "h2");
    }
}
