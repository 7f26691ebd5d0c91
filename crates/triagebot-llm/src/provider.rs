use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use triagebot_core::types::{Category, Urgency};

/// Input to a single classifier call (§4.2): one inbound message's text
/// against a fixed incident-triage prompt.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub model: String,
    pub text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A single model's raw verdict, before consensus combination (§4.2).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationResponse {
    pub is_incident: bool,
    pub confidence: f64,
    pub category: Option<Category>,
    pub urgency: Option<Urgency>,
    pub rationale: String,
}

/// Common interface for the two independent classifier backends (§4.2
/// "one primary and one secondary"). Mirrors the teacher's `LlmProvider`
/// trait, narrowed to the single one-shot classification call this system
/// needs — no streaming, no tool loop.
#[async_trait]
pub trait ClassifierProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(
        &self,
        req: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("call timed out after {ms}ms")]
    Timeout { ms: u64 },
}

/// System prompt shared by every backend — instructs the model to return
/// exactly the JSON shape [`ClassificationResponse`] deserializes from.
pub fn triage_system_prompt() -> &'static str {
    "You are a support-incident triage classifier for a retail point-of-sale \
     operator's chat channel. Given a single chat message, decide whether it \
     describes a genuine support incident (a system malfunction, outage, or \
     blocking error the user needs help with) as opposed to chit-chat, \
     thanks, or an unrelated message. Respond with ONLY a JSON object of the \
     exact shape: \
     {\"is_incident\": bool, \"confidence\": number between 0 and 1, \
     \"category\": one of \"POS\"|\"NETWORK\"|\"INVENTORY\"|\"HARDWARE\"|\"SOFTWARE\"|\"OTHER\" or null, \
     \"urgency\": one of \"high\"|\"medium\"|\"low\" or null, \
     \"rationale\": a short string}. \
     Set category/urgency to null when is_incident is false."
}

/// Wrap a classifier call with a per-call timeout (§5: default 30 s),
/// reporting a timeout as a call error that feeds into consensus as a
/// per-side error (§4.2 "one errored" / "both errored" cases).
pub async fn classify_with_timeout(
    provider: &dyn ClassifierProvider,
    req: &ClassificationRequest,
    timeout: std::time::Duration,
) -> Result<ClassificationResponse, ProviderError> {
    match tokio::time::timeout(timeout, provider.classify(req)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            ms: timeout.as_millis() as u64,
        }),
    }
}
