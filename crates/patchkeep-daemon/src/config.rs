//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use patchkeep_manager::{DEFAULT_CLIENT_NAME, DEFAULT_RETRY_INTERVAL, ManagerConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PATCHKEEP_CONFIG";

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Connection manager settings, shared by every backend
    #[serde(default)]
    pub manager: ManagerSection,
    /// Which backends to run
    #[serde(default)]
    pub backends: BackendsConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[manager]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerSection {
    /// Client name registered with the server
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Seconds between reconnection attempts
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Only manage ports whose composite name matches this regex
    #[serde(default)]
    pub port_filter: Option<String>,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            retry_interval_secs: default_retry_interval_secs(),
            port_filter: None,
        }
    }
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_secs()
}

/// `[backends]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendsConfig {
    /// Run the audio connection manager
    #[serde(default = "default_true")]
    pub audio: bool,
    /// Run the MIDI connection manager
    #[serde(default = "default_true")]
    pub midi: bool,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self { audio: true, midi: true }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Settings handed to each connection manager.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            client_name: self.manager.client_name.clone(),
            retry_interval: Duration::from_secs(self.manager.retry_interval_secs),
            port_filter: self.manager.port_filter.clone(),
        }
    }
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Load configuration from a specific path, using defaults if it is absent.
pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dirs = ProjectDirs::from("org", "patchkeep", "Patchkeep")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
