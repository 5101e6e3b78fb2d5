//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     register(path, action, methods, handler)
//!     → table.rs (path normalized, (path, action) → handler)
//!     → frozen behind Arc<RouteTable>
//!
//! Per request:
//!     matched path + body action (or "-")
//!     → table.rs lookup
//!     → handler.rs Handler::call(ctx)
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Action selects the handler from the body, not the URL
//! - Explicit not-found errors rather than a silent default

pub mod handler;
pub mod table;

pub use handler::{handler_fn, Handler, HandlerFn, HandlerFuture};
pub use table::{Methods, RouteKey, RouteTable};
