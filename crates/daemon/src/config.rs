//! Configuration management for the Filedock daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filedock/config.toml`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::{DEFAULT_HASH_BUFFER_SIZE, DEFAULT_MAX_IN_FLIGHT};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_in_flight must be between 1 and 1024, got {0}")]
    InvalidMaxInFlight(usize),

    #[error("hash_buffer_size must be between 1 KiB and 16 MiB, got {0} bytes")]
    InvalidHashBufferSize(usize),

    #[error("port must be greater than 0")]
    InvalidPort,

    #[error("bind must be an IP address, got {0}")]
    InvalidBindAddress(String),

    #[error("sandbox_root must not be empty")]
    EmptySandboxRoot,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const MAX_IN_FLIGHT_LIMIT: usize = 1024;
const MIN_HASH_BUFFER_SIZE: usize = 1024;
const MAX_HASH_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration structure for the Filedock daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// File operation configuration.
    pub file: FileConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory holding the operational log file.
    pub log_dir: PathBuf,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,

    /// Port to listen on.
    pub port: u16,
}

/// File operation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Directory every request path is resolved against. Created at startup.
    pub sandbox_root: PathBuf,

    /// Maximum number of batch transfers running at once.
    pub max_in_flight: usize,

    /// Read buffer size used when hashing, in bytes.
    pub hash_buffer_size: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: default_data_dir().join("logs"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            sandbox_root: default_data_dir().join("demo"),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }
}

/// Outcome of one environment variable override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOverride {
    /// The variable replaced a configuration value.
    Applied { var: &'static str, value: String },
    /// The variable was set but could not be used.
    Ignored {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl EnvOverride {
    /// Report the override through `tracing`.
    pub fn log(&self) {
        match self {
            EnvOverride::Applied { var, value } => {
                tracing::info!("Overriding config from environment: {}={}", var, value);
            }
            EnvOverride::Ignored { var, value, reason } => {
                tracing::warn!("Ignoring invalid {} {:?}: {}", var, value, reason);
            }
        }
    }
}

/// Non-empty value of an environment variable.
fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedock")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedock")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEDOCK_SANDBOX_ROOT: Override the sandbox root directory
    /// - FILEDOCK_PORT: Override the listening port
    /// - FILEDOCK_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    ///
    /// Runs before logging is installed, so the outcome is returned for the
    /// caller to log.
    pub fn apply_env_overrides(&mut self) -> Vec<EnvOverride> {
        let mut applied = Vec::new();

        if let Some(root) = env_value("FILEDOCK_SANDBOX_ROOT") {
            self.file.sandbox_root = PathBuf::from(&root);
            applied.push(EnvOverride::Applied {
                var: "FILEDOCK_SANDBOX_ROOT",
                value: root,
            });
        }

        if let Some(port) = env_value("FILEDOCK_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => {
                    self.server.port = parsed;
                    applied.push(EnvOverride::Applied {
                        var: "FILEDOCK_PORT",
                        value: port,
                    });
                }
                Err(e) => applied.push(EnvOverride::Ignored {
                    var: "FILEDOCK_PORT",
                    value: port,
                    reason: e.to_string(),
                }),
            }
        }

        if let Some(level) = env_value("FILEDOCK_LOG_LEVEL") {
            self.daemon.log_level = level.clone();
            applied.push(EnvOverride::Applied {
                var: "FILEDOCK_LOG_LEVEL",
                value: level,
            });
        }

        applied
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.max_in_flight < 1 || self.file.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(ConfigError::InvalidMaxInFlight(self.file.max_in_flight));
        }

        if self.file.hash_buffer_size < MIN_HASH_BUFFER_SIZE
            || self.file.hash_buffer_size > MAX_HASH_BUFFER_SIZE
        {
            return Err(ConfigError::InvalidHashBufferSize(self.file.hash_buffer_size));
        }

        if self.file.sandbox_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptySandboxRoot);
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.server.bind.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddress(self.server.bind.clone()));
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// The `bind:port` address the HTTP server listens on.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
