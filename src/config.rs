//! Server configuration
//!
//! Every field has a default, so an empty (or absent) configuration file
//! yields a runnable server on the fixed port.

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Environment variable naming an optional JSON configuration file
pub const CONFIG_ENV: &str = "CHAT_ROOMS_CONFIG";

/// Runtime settings for the listener and the session core
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address
    pub bind_addr: String,
    /// Room every session is auto-joined to
    pub lobby: String,
    /// Longest accepted input line in bytes; the rest is truncated
    pub max_line_length: usize,
    /// Queued outbound lines per session
    pub outbound_buffer: usize,
    /// Consecutive failed deliveries before a session is torn down
    pub max_delivery_failures: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8888".to_string(),
            lobby: "Lobby".to_string(),
            max_line_length: 1024,
            outbound_buffer: 64,
            max_delivery_failures: 3,
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load from the file named by `CHAT_ROOMS_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }
}
