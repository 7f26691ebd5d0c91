use thiserror::Error;

/// Error taxonomy shared by all three services.
///
/// Every variant maps to a stable `code()` used in HTTP error bodies and in
/// `service.notifications` failure payloads, so callers across process
/// boundaries can match on the string without depending on this crate.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bus connection error: {0}")]
    Connection(String),

    #[error("helpdesk authentication expired")]
    AuthExpired,

    #[error("transport authentication failed permanently: {0}")]
    AuthenticationError(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("queue overflow: {0}")]
    QueueOverflow(String),

    #[error("circuit breaker open for {0}")]
    CircuitOpen(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// Short, stable code surfaced on bus notifications and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TriageError::Config(_) => "CONFIG_ERROR",
            TriageError::Connection(_) => "CONNECTION_ERROR",
            TriageError::AuthExpired => "AUTH_EXPIRED",
            TriageError::AuthenticationError(_) => "AUTHENTICATION_ERROR",
            TriageError::Validation(_) => "VALIDATION_ERROR",
            TriageError::RateLimit(_) => "RATE_LIMIT",
            TriageError::Transient(_) => "TRANSIENT_ERROR",
            TriageError::QueueOverflow(_) => "QUEUE_OVERFLOW",
            TriageError::CircuitOpen(_) => "CIRCUIT_OPEN",
            TriageError::NotFound(_) => "NOT_FOUND",
            TriageError::Serialization(_) => "SERIALIZATION_ERROR",
            TriageError::Io(_) => "IO_ERROR",
            TriageError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller should retry this error with backoff, per §7's
    /// propagation policy. Validation and rate-limit errors are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TriageError::Connection(_) | TriageError::Transient(_) | TriageError::AuthExpired
        )
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
