//! Configuration loading and management

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::{ProtocolShape, ReaperConfig};
use serde::{Deserialize, Serialize};

/// Main configuration for the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds of silence before a participant is dropped (default: 8)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Seconds between reap cycles (default: 2)
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: f64,

    /// Protocol shape exposed on `/sync` (default: combined)
    #[serde(default)]
    pub protocol: ProtocolShape,
}

fn default_timeout_secs() -> f64 {
    8.0
}

fn default_reap_interval_secs() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            protocol: ProtocolShape::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or defaults when no file is given.
    ///
    /// Unlike a missing `path` argument, a path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::info!("No config file given, using defaults");
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reaper timing derived from this config, validated.
    pub fn reaper_config(&self) -> Result<ReaperConfig> {
        let config = ReaperConfig {
            timeout: secs("timeout_secs", self.timeout_secs)?,
            interval: secs("reap_interval_secs", self.reap_interval_secs)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    if value.is_nan() || value <= 0.0 {
        anyhow::bail!("{} must be a positive number of seconds, got {}", field, value);
    }
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} is out of range: {}", field, value))
}
