//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, one route per registered path)
//!     → read body (bounded by limits.max_body_size)
//!     → dispatcher.rs (decode, identify, time check, route, run handler)
//!     → ResponseEnvelope, always HTTP 200
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod server;

pub use dispatcher::Dispatcher;
pub use server::HttpServer;
