use serde::{Deserialize, Serialize};

use triagebot_core::config::{
    AdminConfig, BusConfig, LoggingConfig, OUTBOUND_QUEUE_CAP, OUTBOUND_RATE_MAX,
    OUTBOUND_RATE_WINDOW_SECS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub transport: TransportSettings,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
            admin: AdminConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            transport: TransportSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// This bot's own identity on the transport, used to drop self-authored
    /// events (§4.1 step 1).
    #[serde(default = "default_self_id")]
    pub self_id: String,
    #[serde(default = "default_media_root")]
    pub media_root: String,
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    #[serde(default = "default_message_log_dir")]
    pub message_log_dir: String,
    #[serde(default = "default_outbound_queue_cap")]
    pub outbound_queue_cap: usize,
    #[serde(default = "default_outbound_rate_window_secs")]
    pub outbound_rate_window_secs: u64,
    #[serde(default = "default_outbound_rate_max")]
    pub outbound_rate_max: u32,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_session_backups_to_keep")]
    pub session_backups_to_keep: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            self_id: default_self_id(),
            media_root: default_media_root(),
            session_dir: default_session_dir(),
            message_log_dir: default_message_log_dir(),
            outbound_queue_cap: default_outbound_queue_cap(),
            outbound_rate_window_secs: default_outbound_rate_window_secs(),
            outbound_rate_max: default_outbound_rate_max(),
            retry_max_attempts: default_retry_max_attempts(),
            session_backups_to_keep: default_session_backups_to_keep(),
        }
    }
}

fn default_self_id() -> String {
    "bot@triagebot.local".to_string()
}

fn default_media_root() -> String {
    "./data/media".to_string()
}

fn default_session_dir() -> String {
    "./data/session".to_string()
}

fn default_message_log_dir() -> String {
    "./data/logs".to_string()
}

fn default_outbound_queue_cap() -> usize {
    OUTBOUND_QUEUE_CAP
}

fn default_outbound_rate_window_secs() -> u64 {
    OUTBOUND_RATE_WINDOW_SECS
}

fn default_outbound_rate_max() -> u32 {
    OUTBOUND_RATE_MAX
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_session_backups_to_keep() -> usize {
    3
}
