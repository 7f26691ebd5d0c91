use thiserror::Error;
use triagebot_core::TriageError;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("queue overflow: {0}")]
    QueueOverflow(String),
}

impl From<BusError> for TriageError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Redis(e) => TriageError::Connection(e.to_string()),
            BusError::Serde(e) => TriageError::Serialization(e),
            BusError::QueueOverflow(s) => TriageError::QueueOverflow(s),
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
