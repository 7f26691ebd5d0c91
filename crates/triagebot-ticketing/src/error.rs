use thiserror::Error;

/// Errors surfaced by the OAuth store and the helpdesk client.
#[derive(Debug, Error)]
pub enum TicketingError {
    #[error("oauth database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no persisted oauth state; operator bootstrap required")]
    NotBootstrapped,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("helpdesk API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("helpdesk authentication expired")]
    AuthExpired,

    #[error("call timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("circuit breaker open for helpdesk")]
    CircuitOpen,
}

impl TicketingError {
    /// Whether this error should count as a circuit-breaker failure (§4.3).
    /// A deliberately rejected call (breaker already open) must not count a
    /// second time against the same breaker.
    pub fn counts_as_breaker_failure(&self) -> bool {
        !matches!(self, TicketingError::CircuitOpen)
    }
}

pub type Result<T> = std::result::Result<T, TicketingError>;
