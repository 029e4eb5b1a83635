//! Configuration management for the Filedeck daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filedeck/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("host must not be empty")]
    EmptyHost,

    #[error("sandbox root must not be empty")]
    EmptyRoot,

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("max_depth must be greater than 0, got {0}")]
    InvalidMaxDepth(usize),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;

/// Main configuration structure for the Filedeck daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Sandbox configuration.
    pub sandbox: SandboxConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily-rolling log files. Logs go to stdout only if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Directory with the browser client's static assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

/// Sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Root directory exposed to clients.
    pub root: PathBuf,

    /// Maximum upload request size in bytes (default: 100MB).
    pub max_upload_size: u64,

    /// Maximum depth walked when aggregating directory sizes.
    pub max_depth: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            max_upload_size: 100 * 1024 * 1024, // 100MB
            max_depth: crate::files::DEFAULT_MAX_DEPTH,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedeck")
        .join("config.toml")
}

/// One environment variable that `apply_env_overrides` looked at.
///
/// Overrides are applied before logging is set up, so the caller logs these
/// once the subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOverride {
    /// The value replaced the configured one.
    Applied { var: &'static str, value: String },
    /// The value could not be parsed and the configured one was kept.
    Ignored {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEDECK_ROOT: Override the sandbox root
    /// - FILEDECK_HOST: Override the listening host
    /// - FILEDECK_PORT: Override the listening port
    /// - FILEDECK_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    ///
    /// Empty variables are skipped. Returns one record per non-empty variable.
    pub fn apply_env_overrides(&mut self) -> Vec<EnvOverride> {
        let mut applied = Vec::new();

        if let Some(root) = non_empty_env("FILEDECK_ROOT") {
            self.sandbox.root = PathBuf::from(&root);
            applied.push(EnvOverride::Applied {
                var: "FILEDECK_ROOT",
                value: root,
            });
        }

        if let Some(host) = non_empty_env("FILEDECK_HOST") {
            self.server.host = host.clone();
            applied.push(EnvOverride::Applied {
                var: "FILEDECK_HOST",
                value: host,
            });
        }

        if let Some(port) = non_empty_env("FILEDECK_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => {
                    self.server.port = parsed;
                    applied.push(EnvOverride::Applied {
                        var: "FILEDECK_PORT",
                        value: port,
                    });
                }
                Err(e) => applied.push(EnvOverride::Ignored {
                    var: "FILEDECK_PORT",
                    value: port,
                    reason: e.to_string(),
                }),
            }
        }

        if let Some(level) = non_empty_env("FILEDECK_LOG_LEVEL") {
            self.daemon.log_level = level.clone();
            applied.push(EnvOverride::Applied {
                var: "FILEDECK_LOG_LEVEL",
                value: level,
            });
        }

        applied
    }

    /// Validate the configuration values.
    ///
    /// The sandbox root is not checked for existence here; that happens when
    /// the path resolver is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        if self.sandbox.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }

        if self.sandbox.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(
                self.sandbox.max_upload_size,
            ));
        }

        if self.sandbox.max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth(self.sandbox.max_depth));
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

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
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
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
