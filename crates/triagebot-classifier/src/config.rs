use serde::{Deserialize, Serialize};

use triagebot_core::config::{AdminConfig, BusConfig, LoggingConfig};

/// Top-level `triagebot-classifier` config (`classifier.toml` +
/// `TRIAGEBOT_CLASSIFIER__*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub classifier: ClassifierSettings,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
            admin: AdminConfig {
                bind: "0.0.0.0".to_string(),
                port: 8081,
            },
            classifier: ClassifierSettings::default(),
        }
    }
}

/// Settings specific to the classification step (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Identity the bot sends messages as; quoted-reply threading (tier 1)
    /// only trusts a quote whose author matches this.
    #[serde(default = "default_bot_identity")]
    pub bot_identity: String,
    pub primary_model: String,
    pub secondary_model: String,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            bot_identity: default_bot_identity(),
            primary_model: "claude-sonnet-4-6".to_string(),
            secondary_model: "gpt-5".to_string(),
            call_timeout_ms: default_call_timeout_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            anthropic_api_key: None,
            openai_api_key: None,
        }
    }
}

fn default_bot_identity() -> String {
    "bot@triagebot.local".to_string()
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    512
}
