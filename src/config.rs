//! Process-wide engine configuration.
//!
//! Settings affect diagnostics only; they never change operation outcomes.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BindingError, Result};

/// Environment variable toggling unavailable-child logging.
pub const ENV_LOG_UNAVAILABLE: &str = "FORMBIND_LOG_UNAVAILABLE";
/// Environment variable holding the attach warning delay in milliseconds.
pub const ENV_ATTACH_WARNING_MS: &str = "FORMBIND_ATTACH_WARNING_MS";

/// Engine configuration.
///
/// # Attributes
///
/// * `log_unavailable` - Log at error level when a composed operation finds
///   unavailable children. Defaults to `true`.
/// * `attach_warning_ms` - When set, a composed get/set still waiting on
///   unattached children after this many milliseconds logs a warning
///   naming them. Defaults to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_unavailable: bool,
    pub attach_warning_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_unavailable: true,
            attach_warning_ms: None,
        }
    }
}

impl Config {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON, filling missing keys with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from `FORMBIND_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_LOG_UNAVAILABLE) {
            config.log_unavailable = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(BindingError::config(format!(
                        "{ENV_LOG_UNAVAILABLE} must be a boolean, got '{other}'"
                    )))
                }
            };
        }

        if let Some(raw) = lookup(ENV_ATTACH_WARNING_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                BindingError::config(format!("{ENV_ATTACH_WARNING_MS}: {e}"))
            })?;
            config.attach_warning_ms = Some(ms);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.attach_warning_ms == Some(0) {
            return Err(BindingError::config("attach_warning_ms must be positive"));
        }
        Ok(())
    }

    /// The attach warning delay, if enabled.
    pub fn attach_warning(&self) -> Option<Duration> {
        self.attach_warning_ms.map(Duration::from_millis)
    }

    /// Builder: set the attach warning delay.
    pub fn with_attach_warning(mut self, after: Duration) -> Self {
        self.attach_warning_ms = Some(after.as_millis().max(1) as u64);
        self
    }

    /// Builder: toggle unavailable-child logging.
    pub fn with_log_unavailable(mut self, enabled: bool) -> Self {
        self.log_unavailable = enabled;
        self
    }
}

static CONFIG: Lazy<Arc<RwLock<Config>>> = Lazy::new(|| Arc::new(RwLock::new(Config::default())));

/// Get a clone of the current global configuration.
pub fn config() -> Config {
    CONFIG.read().clone()
}

/// Replace the global configuration.
pub fn set_config(config: Config) {
    *CONFIG.write() = config;
}
