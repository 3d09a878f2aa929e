//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use slmod_proto::{RoomId, UserId};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("homeserver.url is required")]
    MissingHomeserverUrl,
    #[error("homeserver.url must be http(s), got '{0}'")]
    InvalidHomeserverUrl(String),
    #[error("homeserver.user_id must look like @user:server, got '{0}'")]
    InvalidUserId(String),
    #[error("homeserver.access_token is required")]
    MissingAccessToken,
    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("permitted_rooms entry is not a room id: '{0}'")]
    InvalidPermittedRoom(String),
    #[error("join_rules entry is not a valid glob: '{0}'")]
    InvalidJoinRule(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let homeserver = &config.homeserver;

    if homeserver.url.is_empty() {
        errors.push(ValidationError::MissingHomeserverUrl);
    } else if !(homeserver.url.starts_with("https://") || homeserver.url.starts_with("http://")) {
        errors.push(ValidationError::InvalidHomeserverUrl(homeserver.url.clone()));
    }
    if UserId::parse(&homeserver.user_id).is_err() {
        errors.push(ValidationError::InvalidUserId(homeserver.user_id.clone()));
    }
    if homeserver.access_token.is_empty() {
        errors.push(ValidationError::MissingAccessToken);
    }

    let limits = &config.limits;
    if limits.fanout_concurrency == 0 {
        errors.push(ValidationError::ZeroLimit("fanout_concurrency"));
    }
    if limits.page_size == 0 {
        errors.push(ValidationError::ZeroLimit("page_size"));
    }
    if limits.notice_interval_ms == 0 {
        errors.push(ValidationError::ZeroLimit("notice_interval_ms"));
    }

    for room in &config.permitted_rooms {
        if RoomId::parse(room).is_err() {
            errors.push(ValidationError::InvalidPermittedRoom(room.clone()));
        }
    }
    for rule in &config.join_rules {
        if glob::Pattern::new(rule).is_err() {
            errors.push(ValidationError::InvalidJoinRule(rule.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HomeserverConfig, LimitsConfig};

    fn config() -> Config {
        Config {
            homeserver: HomeserverConfig {
                url: "https://matrix.example.org".to_string(),
                user_id: "@slmod:example.org".to_string(),
                access_token: "token".to_string(),
                request_timeout_secs: 30,
            },
            limits: LimitsConfig::default(),
            permitted_rooms: vec!["!room:example.org".to_string()],
            join_rules: vec!["@spam*:*".to_string()],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = config();
        config.homeserver.user_id = "slmod".to_string();
        config.homeserver.access_token.clear();
        config.limits.page_size = 0;
        config.permitted_rooms.push("#alias:example.org".to_string());
        config.join_rules.push("@[bad:*".to_string());

        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(errors[0], ValidationError::InvalidUserId(_)));
        assert!(matches!(errors[2], ValidationError::ZeroLimit("page_size")));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut config = config();
        config.homeserver.url = "matrix.example.org".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidHomeserverUrl(_)));
    }
}
