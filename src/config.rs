//! Dispatcher configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working dispatcher.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Deadline applied to every offloaded task unless configured otherwise
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5000;

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OffloadConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// `[dispatcher]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatcherConfig {
    /// Per-task deadline in milliseconds (default: 5000)
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// When false, every task runs in-process and no worker is spawned
    #[serde(default = "default_worker_enabled")]
    pub worker_enabled: bool,
    /// Name given to the background worker thread
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,
}

fn default_task_timeout_ms() -> u64 {
    DEFAULT_TASK_TIMEOUT_MS
}

fn default_worker_enabled() -> bool {
    true
}

fn default_worker_thread_name() -> String {
    "property-offload-worker".to_string()
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: default_task_timeout_ms(),
            worker_enabled: default_worker_enabled(),
            worker_thread_name: default_worker_thread_name(),
        }
    }
}

impl DispatcherConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Builder used mostly by tests to shorten the deadline
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_worker_enabled(mut self, enabled: bool) -> Self {
        self.worker_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "dispatcher.task_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "dispatcher.worker_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OffloadConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: OffloadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatcher.validate()
    }
}
