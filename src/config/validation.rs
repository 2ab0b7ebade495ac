//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, parseable address)
//! - Check path settings are absolute request paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::auth::session::MAX_SESSION_TTL_HOURS;
use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} `{value}` must start with '/'")]
    NotAbsolute { field: &'static str, value: String },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("auth.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("duplicate user `{0}`")]
    DuplicateUser(String),
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let positive = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("timeouts.idle_secs", config.timeouts.idle_secs),
        ("limits.max_header_bytes", config.limits.max_header_bytes as u64),
        ("auth.session_ttl_hours", config.auth.session_ttl_hours),
        ("websocket.max_payload_bytes", config.websocket.max_payload_bytes),
        ("websocket.outbound_queue_frames", config.websocket.outbound_queue_frames as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.auth.session_ttl_hours > MAX_SESSION_TTL_HOURS {
        errors.push(ValidationError::TooLarge {
            field: "auth.session_ttl_hours",
            max: MAX_SESSION_TTL_HOURS,
        });
    }
    if config.auth.sweep_interval_secs == Some(0) {
        errors.push(ValidationError::Zero("auth.sweep_interval_secs"));
    }

    if config.auth.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    let mut paths = vec![
        ("auth.login_path", &config.auth.login_path),
        ("auth.landing_path", &config.auth.landing_path),
    ];
    paths.extend(
        config
            .auth
            .protected_prefixes
            .iter()
            .map(|p| ("auth.protected_prefixes", p)),
    );
    for (field, value) in paths {
        if !value.starts_with('/') {
            errors.push(ValidationError::NotAbsolute {
                field,
                value: value.clone(),
            });
        }
    }

    let mut seen = std::collections::HashSet::new();
    for user in &config.users {
        if !seen.insert(user.username.to_lowercase()) {
            errors.push(ValidationError::DuplicateUser(user.username.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
