pub mod prefs;
pub use prefs::ConfigParseError;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// Re-export existing config types
pub use crate::filter::Policy;
pub use crate::influx::InfluxConfig;

/// Placeholder shown instead of the backend password
pub const REDACTED: &str = "********";

/// Complete homeflux configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Log every outgoing point and every coercion failure
    #[serde(default)]
    pub debug: bool,
}

/// Heartbeat scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the scheduler wakes up (seconds)
    #[serde(default = "default_wake_interval")]
    pub wake_interval_seconds: u64,
    /// Longest an entity may go without a write (seconds)
    #[serde(default = "default_minimum_update_frequency")]
    pub minimum_update_frequency_seconds: u64,
}

fn default_wake_interval() -> u64 {
    60
}

fn default_minimum_update_frequency() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            wake_interval_seconds: default_wake_interval(),
            minimum_update_frequency_seconds: default_minimum_update_frequency(),
        }
    }
}

/// Host API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Socket address the host API listens on
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8087".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl BridgeConfig {
    /// Apply `HOMEFLUX_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOMEFLUX_INFLUX_HOST") {
            self.influx.host = v;
        }
        if let Some(v) = lookup("HOMEFLUX_INFLUX_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.influx.port = port;
            }
        }
        if let Some(v) = lookup("HOMEFLUX_INFLUX_USER") {
            self.influx.user = v;
        }
        if let Some(v) = lookup("HOMEFLUX_INFLUX_PASSWORD") {
            self.influx.password = v;
        }
        if let Some(v) = lookup("HOMEFLUX_INFLUX_DATABASE") {
            self.influx.database = v;
        }
        if let Some(v) = lookup("HOMEFLUX_LISTEN") {
            self.api.listen = v;
        }
    }

    /// Copy safe to hand out over the API
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.influx.password.is_empty() {
            copy.influx.password = REDACTED.to_string();
        }
        copy
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BridgeConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load configuration, using defaults when the file does not exist
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return Ok(BridgeConfig::default());
    }
    load_config(path)
}
