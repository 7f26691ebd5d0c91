//! Exponential backoff with jitter, shared by the reconnect state machine
//! (§4.1), the bus publisher (§4.1.2), the outbound retry queue (§4.1), and
//! the circuit breaker's cooldown (§4.3).
//!
//! Grounded on `skynet-channels::manager`'s `connect_with_backoff`/
//! `jitter_secs`: jitter is derived from the current monotonic clock's
//! sub-second nanos rather than pulling in a dedicated `rand` dependency,
//! same trade-off the teacher makes for the same reason.

use std::time::Duration;

/// `min(base * 2^attempt, cap)`, attempt is 0-indexed (first retry = attempt 0).
pub fn exponential_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let scaled = base.as_millis().saturating_mul(factor as u128);
    let capped = scaled.min(cap.as_millis());
    Duration::from_millis(capped as u64)
}

/// Apply `±fraction` jitter to `delay`, using the current clock's sub-second
/// nanos as an inexpensive, dependency-free entropy source. `fraction` is in
/// `[0.0, 1.0]`.
pub fn with_jitter(delay: Duration, fraction: f64) -> Duration {
    if delay.is_zero() || fraction <= 0.0 {
        return delay;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter_ms = (delay.as_millis() as f64 * fraction) as u64;
    if max_jitter_ms == 0 {
        return delay;
    }

    // Spread the jitter over [-max, +max] instead of skynet-channels' [0, +max]
    // only, so callers observing the delay distribution see it centered on
    // the nominal value (§8 invariant 8 expects a symmetric ±25% band).
    let raw = (nanos as u64) % (2 * max_jitter_ms + 1);
    let offset = raw as i64 - max_jitter_ms as i64;

    let base_ms = delay.as_millis() as i64;
    let jittered_ms = (base_ms + offset).max(0) as u64;
    Duration::from_millis(jittered_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_doubles_then_caps() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);
        assert_eq!(exponential_delay(base, 0, cap), Duration::from_secs(1));
        assert_eq!(exponential_delay(base, 1, cap), Duration::from_secs(2));
        assert_eq!(exponential_delay(base, 2, cap), Duration::from_secs(4));
        assert_eq!(exponential_delay(base, 10, cap), cap);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let delay = Duration::from_secs(10);
        for _ in 0..50 {
            let jittered = with_jitter(delay, 0.25);
            assert!(jittered.as_millis() >= 7_500);
            assert!(jittered.as_millis() <= 12_500);
        }
    }
}
