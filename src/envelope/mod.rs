//! Envelope protocol subsystem.
//!
//! # Data Flow
//! ```text
//! raw body bytes
//!     → codec.rs (decode into a JSON object)
//!     → context.rs (per-request state, handler input/output)
//!     → codec.rs (encode the fixed envelope)
//!     → {"requestId", "errCode", "errMsg", "data"}
//! ```
//!
//! # Design Decisions
//! - Request bodies stay schema-less at the boundary; handlers decode typed
//!   payloads themselves
//! - The envelope shape is fixed and always answered with HTTP 200

pub mod codec;
pub mod context;

pub use codec::{decode, encode, RequestDocument, ResponseEnvelope};
pub use context::RequestContext;

/// Action value meaning "this path is called without an action field".
pub const NO_ACTION: &str = "-";

/// errMsg of a successful envelope.
pub const SUCCESS_MSG: &str = "succ";
