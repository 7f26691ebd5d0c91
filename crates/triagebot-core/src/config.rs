use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Default IncidentRecord TTL (§3), in seconds.
pub const INCIDENT_TTL_SECS: u64 = 7_200;
/// Duplicate-message fingerprint window (§4.1).
pub const DUPLICATE_WINDOW_SECS: u64 = 5;
/// Per-sender inbound rate limit window and cap (§4.1 / §8 invariant 7).
pub const INBOUND_RATE_WINDOW_SECS: u64 = 60;
pub const INBOUND_RATE_MAX: u32 = 30;
/// Per-destination outbound rate limit window and cap.
pub const OUTBOUND_RATE_WINDOW_SECS: u64 = 60;
pub const OUTBOUND_RATE_MAX: u32 = 20;
/// Outbound priority queue hard cap (§4.1).
pub const OUTBOUND_QUEUE_CAP: usize = 10_000;
/// Bus publisher intermediate queue cap (§4.1.2).
pub const BUS_PUBLISHER_QUEUE_CAP: usize = 1_000;
/// Max outbound send body size, in UTF-16 code units (§3).
pub const MAX_BODY_CODE_UNITS: usize = 4_096;

/// Connection details for the shared bus + key/value store (§9A: Redis).
///
/// Parsed identically by all three services so a single `.env`/TOML file
/// can configure the whole deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_url")]
    pub url: String,
    /// Physical prefix prepended to every logical topic/key name, so multiple
    /// deployments can share one Redis instance without collision.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            namespace: default_namespace(),
        }
    }
}

fn default_bus_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_namespace() -> String {
    "triagebot".to_string()
}

/// Structured-logging configuration, read by every service's `main.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP admin surface bind address (§6), shared shape across services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

/// Load a service config of type `T` from `{path}` (TOML) with environment
/// overrides under `{env_prefix}_`, falling back to `T::default()` when no
/// file is present. Mirrors the teacher's `SkynetConfig::load` layering.
pub fn load_config<T>(path: Option<&str>, env_prefix: &str, default_path: &str) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    let path = path.unwrap_or(default_path);

    let figment = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(&format!("{env_prefix}_")).split("__"));

    match figment.extract::<T>() {
        Ok(config) => Ok(config),
        Err(e) => Err(TriageError::Config(e.to_string())),
    }
}
