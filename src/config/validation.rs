//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool sizes > 0, payload limit > 0)
//! - Detect transports fighting over the same port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReceiverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::ReceiverConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{transport} pool_size must be at least 1")]
    EmptyPool { transport: &'static str },

    #[error("tcp and tls both bind {host}:{port}")]
    PortConflict { host: String, port: u16 },

    #[error("connection.max_payload_bytes must be greater than 0")]
    ZeroPayloadLimit,

    #[error("duplicate user {0} in auth.users")]
    DuplicateUser(String),

    #[error("unknown log level {0}")]
    UnknownLogLevel(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ReceiverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tcp.pool_size == 0 {
        errors.push(ValidationError::EmptyPool { transport: "tcp" });
    }
    if config.tls.enabled && config.tls.pool_size == 0 {
        errors.push(ValidationError::EmptyPool { transport: "tls" });
    }

    // Port 0 is ephemeral and never conflicts.
    if config.tls.enabled
        && config.tcp.port != 0
        && config.tcp.port == config.tls.port
        && config.tcp.host == config.tls.host
    {
        errors.push(ValidationError::PortConflict {
            host: config.tcp.host.clone(),
            port: config.tcp.port,
        });
    }

    if config.connection.max_payload_bytes == 0 {
        errors.push(ValidationError::ZeroPayloadLimit);
    }

    let mut seen = HashSet::new();
    for user in &config.auth.users {
        if !seen.insert(user.username.as_str()) {
            errors.push(ValidationError::DuplicateUser(user.username.clone()));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
