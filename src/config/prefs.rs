//! Host preference maps
//!
//! The host hands over its plugin dialog as a flat key/value map. Values
//! arrive as strings, numbers or booleans depending on the host version.
//! A value that does not parse is reported and the previous setting kept.

use super::BridgeConfig;
use crate::entity::parse_name_list;
use crate::filter::PolicyMode;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

pub const PREF_HOST: &str = "host";
pub const PREF_PORT: &str = "port";
pub const PREF_USER: &str = "user";
pub const PREF_PASSWORD: &str = "password";
pub const PREF_DATABASE: &str = "database";
pub const PREF_MODE: &str = "ddlMode";
pub const PREF_GLOBAL_INCLUDE: &str = "txtGlobalInclude";
pub const PREF_GLOBAL_EXCLUDE: &str = "txtGlobalExclude";
pub const PREF_MINIMUM_UPDATE_FREQUENCY: &str = "txtMinimumUpdateFrequency";
pub const PREF_DEBUG: &str = "debug";
pub const PREF_RESET: &str = "reset";

/// A host preference that could not be applied
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigParseError {
    #[error("invalid policy mode {0:?}, keeping previous mode")]
    InvalidMode(String),

    #[error("invalid value {value} for '{key}', keeping previous value")]
    InvalidValue { key: String, value: String },
}

fn invalid(key: &str, value: &Value) -> ConfigParseError {
    ConfigParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Scalar preference value as text
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl BridgeConfig {
    /// Apply a host preference map on top of the current settings.
    ///
    /// Unknown keys are ignored. Every value that fails to parse leaves the
    /// previous setting in place and is returned (and logged).
    pub fn apply_prefs(&mut self, prefs: &HashMap<String, Value>) -> Vec<ConfigParseError> {
        let mut errors = Vec::new();

        for (key, target) in [
            (PREF_HOST, &mut self.influx.host),
            (PREF_USER, &mut self.influx.user),
            (PREF_PASSWORD, &mut self.influx.password),
            (PREF_DATABASE, &mut self.influx.database),
        ] {
            if let Some(value) = prefs.get(key) {
                match as_text(value) {
                    Some(text) => *target = text,
                    None => errors.push(invalid(key, value)),
                }
            }
        }

        if let Some(value) = prefs.get(PREF_PORT) {
            match as_u64(value).and_then(|p| u16::try_from(p).ok()) {
                Some(port) => self.influx.port = port,
                None => errors.push(invalid(PREF_PORT, value)),
            }
        }

        if let Some(value) = prefs.get(PREF_MODE) {
            match as_text(value).map(|s| s.parse::<PolicyMode>()) {
                Some(Ok(mode)) => self.policy.mode = mode,
                _ => errors.push(ConfigParseError::InvalidMode(
                    as_text(value).unwrap_or_else(|| value.to_string()),
                )),
            }
        }

        for (key, target) in [
            (PREF_GLOBAL_INCLUDE, &mut self.policy.include),
            (PREF_GLOBAL_EXCLUDE, &mut self.policy.exclude),
        ] {
            if let Some(value) = prefs.get(key) {
                match value {
                    Value::String(raw) => *target = parse_name_list(raw),
                    Value::Null => target.clear(),
                    other => errors.push(invalid(key, other)),
                }
            }
        }

        if let Some(value) = prefs.get(PREF_MINIMUM_UPDATE_FREQUENCY) {
            match as_u64(value) {
                Some(seconds) => self.scheduler.minimum_update_frequency_seconds = seconds,
                None => errors.push(invalid(PREF_MINIMUM_UPDATE_FREQUENCY, value)),
            }
        }

        for (key, target) in [
            (PREF_DEBUG, &mut self.debug),
            (PREF_RESET, &mut self.influx.reset),
        ] {
            if let Some(value) = prefs.get(key) {
                match as_bool(value) {
                    Some(flag) => *target = flag,
                    None => errors.push(invalid(key, value)),
                }
            }
        }

        for error in &errors {
            warn!(error = %error, "Problem parsing host preferences, check plugin config");
        }
        info!(
            mode = %self.policy.mode,
            include = self.policy.include.len(),
            exclude = self.policy.exclude.len(),
            minimum_update_frequency = self.scheduler.minimum_update_frequency_seconds,
            "Applied host preferences"
        );

        errors
    }
}
