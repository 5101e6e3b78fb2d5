//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → copied into the subsystems that need it at startup
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DispatchConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ServiceConfig,
    TimeoutConfig,
};
