//! Configuration file parsing and structures.
//!
//! teslad reads a single TOML file describing logging, where vehicle
//! snapshots come from, and how often devices are polled.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"teslad::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_update_interval_secs() -> u64 {
    660
}

/// Controller configuration
#[derive(Debug, Deserialize)]
pub struct ControllerConfig {
    /// `vehicle_data` JSON documents, one per vehicle
    pub snapshots: Vec<PathBuf>,

    /// Interval between regular polls of a vehicle, in seconds
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
}

impl ControllerConfig {
    /// The update interval, saturating at the largest representable duration
    pub fn update_interval(&self) -> chrono::Duration {
        self.try_update_interval().unwrap_or(chrono::Duration::MAX)
    }

    fn try_update_interval(&self) -> Option<chrono::Duration> {
        i64::try_from(self.update_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// How often every device is refreshed, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// HTTP API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    /// Address to serve the API on; the API is disabled when unset
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let mut config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;

        if config.controller.try_update_interval().is_none() {
            return Err(ConfigError::Invalid(format!(
                "controller.update_interval_secs = {} is out of range",
                config.controller.update_interval_secs
            )));
        }

        // Snapshot paths are relative to the config file
        if let Some(dir) = path.as_ref().parent() {
            for snapshot in &mut config.controller.snapshots {
                if snapshot.is_relative() {
                    *snapshot = dir.join(&*snapshot);
                }
            }
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
