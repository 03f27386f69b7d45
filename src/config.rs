//! Configuration module for the chat relay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Environment variable that overrides the listen port.
const PORT_ENV: &str = "PORT";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Name used when a requested display name is empty, and for
    /// connections that send messages before joining.
    #[serde(default = "default_anonymous_name")]
    pub anonymous_name: String,
    /// Sender name attached to system announcements.
    #[serde(default = "default_system_name")]
    pub system_name: String,
}

fn default_anonymous_name() -> String {
    "anonymous".to_string()
}

fn default_system_name() -> String {
    "System".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            anonymous_name: default_anonymous_name(),
            system_name: default_system_name(),
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
    /// Chat configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PORT`: Override the listen port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.apply_port_override(&port);
        }
    }

    fn apply_port_override(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match value.parse::<u16>() {
            Ok(port) => self.server.port = port,
            Err(_) => tracing::warn!(value, "Ignoring invalid {} override", PORT_ENV),
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the placeholder or system sender names are blank.
    pub fn validate(&self) -> Result<()> {
        if self.chat.anonymous_name.trim().is_empty() {
            return Err(RelayError::Validation(
                "chat.anonymous_name must not be empty".to_string(),
            ));
        }
        if self.chat.system_name.trim().is_empty() {
            return Err(RelayError::Validation(
                "chat.system_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
