//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber was already installed.
pub fn init(log_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

fn default_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("envelope_server={level},tower_http={level}", level = log_level.to_ascii_lowercase()).into()
    })
}
