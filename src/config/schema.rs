//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the envelope server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request dispatch settings.
    pub dispatch: DispatchConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Settings consulted by the dispatcher for every request.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum accepted delay between the client's `requestMs` and arrival,
    /// in milliseconds. 0 disables the check.
    #[serde(alias = "netTimeOutMs")]
    pub net_timeout_ms: u64,
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (body read plus handler) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.dispatch.net_timeout_ms, 0);
        assert_eq!(config.limits.max_body_size, 2 * 1024 * 1024);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [dispatch]
            net_timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatch.net_timeout_ms, 500);
        assert_eq!(config.listener, ListenerConfig::default());
    }

    #[test]
    fn test_net_timeout_alias() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [dispatch]
            netTimeOutMs = 3000
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatch.net_timeout_ms, 3000);
    }
}
