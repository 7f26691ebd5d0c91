//! Circuit breaker wrapping every helpdesk call (§4.3).
//!
//! Grounded on the reconnect backoff idiom in
//! [`triagebot_core::backoff`]/`triagebot-transport::connection`: a small
//! state machine plus a monotonic clock, no external crate needed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// `true` while a half-open probe is in flight, so concurrent callers
    /// don't all race to be "the" probe.
    probe_in_flight: bool,
}

/// Outcome of [`CircuitBreaker::try_acquire`]: whether the caller may
/// proceed, and if so, whether it is acting as the half-open probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    AllowedAsProbe,
    Rejected,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            failure_threshold,
            cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Decide whether a call may proceed right now (§4.3). `Open` rejects
    /// immediately unless the cooldown has elapsed, in which case the
    /// breaker moves to `half_open` and admits exactly one probe.
    pub fn try_acquire(&self) -> Admission {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Rejected
                } else {
                    inner.probe_in_flight = true;
                    Admission::AllowedAsProbe
                }
            }
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.cooldown {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    Admission::AllowedAsProbe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful call. A successful probe closes the breaker.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
    }

    /// Record a failed call. A failed probe re-opens the breaker with a
    /// fresh cooldown; in `closed` state, N consecutive failures open it.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.probe_in_flight = false;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
        for _ in 0..4 {
            assert_eq!(breaker.try_acquire(), Admission::Allowed);
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.try_acquire(), Admission::Allowed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn open_rejects_until_cooldown_elapses() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        breaker.try_acquire();
        breaker.record_failure();
        assert_eq!(breaker.try_acquire(), Admission::Rejected);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(breaker.try_acquire(), Admission::AllowedAsProbe);
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_admits_single_probe_then_rejects_concurrent_callers() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(1));
        breaker.try_acquire();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(breaker.try_acquire(), Admission::AllowedAsProbe);
        assert_eq!(breaker.try_acquire(), Admission::Rejected);
    }

    #[test]
    fn successful_probe_closes_breaker() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(1));
        breaker.try_acquire();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(breaker.try_acquire(), Admission::AllowedAsProbe);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.try_acquire(), Admission::Allowed);
    }

    #[test]
    fn failed_probe_reopens_with_fresh_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.try_acquire();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.try_acquire(), Admission::AllowedAsProbe);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.try_acquire(), Admission::Rejected);
    }
}
