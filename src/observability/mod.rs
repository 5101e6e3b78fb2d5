//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-request spans carrying the requestId)
//!
//! Consumers:
//!     → stdout log
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The client's requestId flows through every log line of a request
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod tracing;
