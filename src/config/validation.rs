//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `listener.bind_address`.
    pub field: &'static str,
    pub message: String,
}

/// Check a deserialized config, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("invalid socket address {:?}", config.listener.bind_address),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: "must be greater than 0".to_string(),
        });
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError {
            field: "limits.max_body_size",
            message: "must be greater than 0".to_string(),
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError {
            field: "observability.log_level",
            message: format!(
                "unknown level {:?}, expected one of {}",
                config.observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "invalid socket address {:?}",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
