//! Generic periodic-task runner.
//!
//! Grounded on the teacher's `skynet-scheduler::engine::SchedulerEngine` tick
//! loop, stripped of its SQLite-backed arbitrary-job model: every periodic
//! task this system needs (retry sweeps, fallback-queue drains, backoff
//! timers) fires a fixed action on a fixed interval rather than running
//! user-defined cron jobs, so a bare `tokio::time::interval` loop plus a
//! shutdown signal is all that's warranted here.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `action` every `interval`, until `shutdown` is triggered.
///
/// `action` is invoked via a per-tick future so it can be `async`. Any error
/// is logged at `warn` and the loop continues — a single failed sweep must
/// not end the worker (§5: the periodic sweep is not a startup-time fatal).
pub async fn run_periodic<F, Fut, E>(
    name: &str,
    interval: Duration,
    shutdown: CancellationToken,
    mut action: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(worker = name, "periodic worker stopping on shutdown signal");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = action().await {
                    warn!(worker = name, error = %e, "periodic sweep failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_on_each_tick_until_cancelled() {
        let count = Arc::new(AtomicU32::new(0));
        let shutdown = CancellationToken::new();

        let count2 = count.clone();
        let shutdown2 = shutdown.clone();
        let handle = tokio::spawn(async move {
            run_periodic::<_, _, std::convert::Infallible>(
                "test",
                Duration::from_millis(10),
                shutdown2,
                || {
                    let count2 = count2.clone();
                    async move {
                        count2.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await;
        });

        tokio::time::advance(Duration::from_millis(35)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
