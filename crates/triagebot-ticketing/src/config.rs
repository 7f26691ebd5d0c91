use serde::{Deserialize, Serialize};

use triagebot_core::config::{AdminConfig, BusConfig, LoggingConfig};

/// Top-level `triagebot-ticketing` config (`ticketing.toml` +
/// `TRIAGEBOT_TICKETING__*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub ticketing: TicketingSettings,
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
            admin: AdminConfig {
                bind: "0.0.0.0".to_string(),
                port: 8082,
            },
            ticketing: TicketingSettings::default(),
        }
    }
}

/// Settings specific to helpdesk authentication and ticket creation (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingSettings {
    #[serde(default = "default_helpdesk_base_url")]
    pub helpdesk_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub organization_id: String,
    #[serde(default = "default_department_id")]
    pub department_id: String,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Consecutive helpdesk-call failures before the breaker opens.
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    /// Cooldown before `open` moves to `half_open`.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
    /// Upper bound on how long a single half-open probe may block.
    #[serde(default = "default_breaker_probe_timeout_secs")]
    pub breaker_probe_timeout_secs: u64,

    /// Fallback-queue sweep interval.
    #[serde(default = "default_fallback_sweep_interval_secs")]
    pub fallback_sweep_interval_secs: u64,
    /// Max retry attempts per fallback-queue entry per sweep pass.
    #[serde(default = "default_fallback_max_attempts")]
    pub fallback_max_attempts: u32,
    /// Delay between attempts within a single sweep pass.
    #[serde(default = "default_fallback_retry_delay_secs")]
    pub fallback_retry_delay_secs: u64,

    /// SQLite file backing persisted OAuth tokens (§9A).
    #[serde(default = "default_oauth_db_path")]
    pub oauth_db_path: String,
}

impl Default for TicketingSettings {
    fn default() -> Self {
        Self {
            helpdesk_base_url: default_helpdesk_base_url(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            organization_id: String::new(),
            department_id: default_department_id(),
            call_timeout_ms: default_call_timeout_ms(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
            breaker_probe_timeout_secs: default_breaker_probe_timeout_secs(),
            fallback_sweep_interval_secs: default_fallback_sweep_interval_secs(),
            fallback_max_attempts: default_fallback_max_attempts(),
            fallback_retry_delay_secs: default_fallback_retry_delay_secs(),
            oauth_db_path: default_oauth_db_path(),
        }
    }
}

fn default_helpdesk_base_url() -> String {
    "https://helpdesk.example.com/api/v1".to_string()
}

fn default_department_id() -> String {
    "support".to_string()
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_secs() -> u64 {
    30
}

fn default_breaker_probe_timeout_secs() -> u64 {
    60
}

fn default_fallback_sweep_interval_secs() -> u64 {
    30
}

fn default_fallback_max_attempts() -> u32 {
    3
}

fn default_fallback_retry_delay_secs() -> u64 {
    5
}

fn default_oauth_db_path() -> String {
    "./data/ticketing/oauth.db".to_string()
}
