//! Connection lifecycle state machine (§4.1).
//!
//! Pure transition logic, kept separate from the actual reconnect loop so
//! the reason-table policy and backoff schedule are unit-testable without a
//! live transport. Grounded on the teacher's `skynet-channels::manager`
//! backoff/jitter idiom, generalized from "retry everything" to the
//! status-code reason table this system requires.

use std::time::Duration;

use triagebot_core::backoff::{exponential_delay, with_jitter};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const JITTER_FRACTION: f64 = 0.25;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    QrIssued,
    Connecting,
    Connected,
    ReconnectScheduled,
    Terminated,
}

/// What to do after a `close{reason}` event (§4.1 reason table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    Retry,
    Terminate,
}

/// Decide the reconnect policy for a close status code, per the reason table.
///
/// `has_ever_connected` disambiguates 401: during initial pairing a 401 is
/// expected flakiness and retryable, but once a session has authenticated
/// successfully a later 401 means the credentials were revoked.
pub fn close_policy(status_code: Option<u16>, has_ever_connected: bool) -> ClosePolicy {
    match status_code {
        Some(401) => {
            if has_ever_connected {
                ClosePolicy::Terminate
            } else {
                ClosePolicy::Retry
            }
        }
        Some(403) => ClosePolicy::Terminate,
        Some(515) => ClosePolicy::Retry,
        Some(503) => ClosePolicy::Retry,
        _ => ClosePolicy::Retry,
    }
}

/// Tracks the connection's current state and reconnect attempt count. Not
/// `Send`-bound by design — the caller (the transport's run loop) owns
/// exclusive access and drives transitions serially.
pub struct ConnectionStateMachine {
    state: ConnectionState,
    has_ever_connected: bool,
    attempts: u32,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            has_ever_connected: false,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn has_ever_connected(&self) -> bool {
        self.has_ever_connected
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_qr(&mut self) {
        self.state = ConnectionState::QrIssued;
    }

    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.has_ever_connected = true;
        self.attempts = 0;
    }

    /// Handle a `close{reason}` event, returning the delay to wait before
    /// the next reconnect attempt, or `None` if the machine has terminated.
    pub fn on_close(&mut self, status_code: Option<u16>) -> Option<Duration> {
        let policy = close_policy(status_code, self.has_ever_connected);
        if policy == ClosePolicy::Terminate || self.attempts >= MAX_RECONNECT_ATTEMPTS {
            self.state = ConnectionState::Terminated;
            return None;
        }

        self.state = ConnectionState::ReconnectScheduled;
        let delay = with_jitter(
            exponential_delay(BACKOFF_BASE, self.attempts, BACKOFF_CAP),
            JITTER_FRACTION,
        );
        self.attempts += 1;
        Some(delay)
    }

    /// Transition back to `disconnected` once the scheduled delay has
    /// elapsed, ready for the next connect attempt.
    pub fn on_reconnect_attempt(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_401_retries_during_initial_pairing() {
        assert_eq!(close_policy(Some(401), false), ClosePolicy::Retry);
    }

    #[test]
    fn authenticated_401_terminates() {
        assert_eq!(close_policy(Some(401), true), ClosePolicy::Terminate);
    }

    #[test]
    fn forbidden_always_terminates() {
        assert_eq!(close_policy(Some(403), true), ClosePolicy::Terminate);
        assert_eq!(close_policy(Some(403), false), ClosePolicy::Terminate);
    }

    #[test]
    fn restart_required_always_retries() {
        assert_eq!(close_policy(Some(515), true), ClosePolicy::Retry);
    }

    #[test]
    fn unknown_codes_default_to_retry() {
        assert_eq!(close_policy(Some(999), true), ClosePolicy::Retry);
        assert_eq!(close_policy(None, true), ClosePolicy::Retry);
    }

    #[test]
    fn successful_open_resets_attempts_and_sets_flag() {
        let mut sm = ConnectionStateMachine::new();
        sm.on_close(Some(503));
        assert_eq!(sm.attempts(), 1);
        sm.on_open();
        assert_eq!(sm.state(), ConnectionState::Connected);
        assert!(sm.has_ever_connected());
        assert_eq!(sm.attempts(), 0);
    }

    #[test]
    fn terminates_after_max_attempts() {
        let mut sm = ConnectionStateMachine::new();
        for _ in 0..MAX_RECONNECT_ATTEMPTS {
            let delay = sm.on_close(Some(503));
            assert!(delay.is_some());
            sm.on_reconnect_attempt();
        }
        assert_eq!(sm.on_close(Some(503)), None);
        assert_eq!(sm.state(), ConnectionState::Terminated);
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let mut sm = ConnectionStateMachine::new();
        let d0 = sm.on_close(Some(503)).unwrap();
        sm.on_reconnect_attempt();
        sm.on_connecting();
        // simulate another failure without a successful open in between
        let d1 = sm.on_close(Some(503)).unwrap();
        assert!(d1 >= d0 || d1.as_millis() <= BACKOFF_CAP.as_millis());
    }
}
