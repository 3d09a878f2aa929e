//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::default_request_timeout_secs;
use super::limits::LimitsConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Moderation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Room service connection.
    pub homeserver: HomeserverConfig,
    /// Fan-out and pagination limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Rooms the engine acts in; empty means every joined room.
    #[serde(default)]
    pub permitted_rooms: Vec<String>,
    /// Globs banned on sight when a matching user joins.
    #[serde(default)]
    pub join_rules: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Room service connection configuration.
#[derive(Clone, Deserialize)]
pub struct HomeserverConfig {
    /// Base URL, e.g. `https://matrix-client.matrix.org`.
    pub url: String,
    /// The identity the engine acts as, e.g. `@slmod:example.org`.
    pub user_id: String,
    /// Pre-provisioned access token for `user_id`.
    pub access_token: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for HomeserverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeserverConfig")
            .field("url", &self.url)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
