//! Configuration module for Parlor.

use serde::Deserialize;
use std::path::Path;

use crate::{ParlorError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum accepted length of a single command line in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Lines that may wait for one client's writer before that client is
    /// disconnected as too slow.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> usize {
    100
}

fn default_max_line_length() -> usize {
    4096
}

fn default_outbound_queue() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_line_length: default_max_line_length(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// Chat core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Number of recent messages each room keeps for replay on join.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Capacity of the shared command queue feeding the processor.
    ///
    /// Session readers wait when the queue is full.
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
}

fn default_history_size() -> usize {
    5
}

fn default_command_queue() -> usize {
    16
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            command_queue: default_command_queue(),
        }
    }
}

/// Per-session command rate limiting.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    /// Whether commands are rate limited at all. Off unless configured.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Number of commands a session may issue in a burst.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Sustained commands per second once the burst is spent.
    #[serde(default = "default_per_second")]
    pub per_second: u32,
}

fn default_rate_limit_enabled() -> bool {
    false
}

fn default_burst() -> u32 {
    20
}

fn default_per_second() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            burst: default_burst(),
            per_second: default_per_second(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty means console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat core configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Rate limit configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParlorError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ParlorError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PARLOR_HOST`: bind address
    /// - `PARLOR_PORT`: listening port
    /// - `PARLOR_LOG_LEVEL`: log level
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = non_empty("PARLOR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PARLOR_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ParlorError::Config(format!("invalid PARLOR_PORT: {port}")))?;
        }
        if let Some(level) = non_empty("PARLOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(ParlorError::Validation(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.max_line_length == 0 {
            return Err(ParlorError::Validation(
                "server.max_line_length must be at least 1".to_string(),
            ));
        }
        if self.server.outbound_queue == 0 {
            return Err(ParlorError::Validation(
                "server.outbound_queue must be at least 1".to_string(),
            ));
        }
        if self.chat.history_size == 0 {
            return Err(ParlorError::Validation(
                "chat.history_size must be at least 1".to_string(),
            ));
        }
        if self.chat.command_queue == 0 {
            return Err(ParlorError::Validation(
                "chat.command_queue must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.enabled && (self.rate_limit.burst == 0 || self.rate_limit.per_second == 0)
        {
            return Err(ParlorError::Validation(
                "rate_limit.burst and rate_limit.per_second must be at least 1 when enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
