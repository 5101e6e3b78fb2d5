//! Error taxonomy for the envelope protocol.
//!
//! Every dispatcher-side failure is turned into an error envelope at the point
//! where it is detected; nothing here ever surfaces as an HTTP status code.

use thiserror::Error;

/// errCode used for every error the dispatcher itself detects.
pub const ERR_CODE_SERVER: u32 = 100;

/// errCode used when a handler aborted abnormally.
pub const ERR_CODE_HANDLER_FAULT: u32 = 101;

/// Body could not be turned into a request document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The HTTP body could not be read (connection error, size limit).
    #[error("Server:http read body err")]
    Read(String),

    /// The body is not a JSON object.
    #[error("Server:http body unmarshal err")]
    Parse(#[from] serde_json::Error),
}

/// No handler matches the (path, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteNotFound {
    /// The request carried no action but the path was never registered with
    /// the no-action sentinel.
    #[error("Server:path not support")]
    NoActionNotAllowed { path: String },

    /// The (path, action) key is missing from the table.
    #[error("Server:action not support")]
    ActionNotSupported { path: String, action: String },
}

/// Rejected route registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Path err: path must not be empty")]
    EmptyPath,

    #[error("Action err: action must not be empty")]
    EmptyAction,

    #[error("Methods err: unknown method set {0:?}, expected POST, GET or BOTH")]
    UnknownMethods(String),

    #[error("Path err: {path:?} cannot be mounted: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path err: {path:?} conflicts with registered path {existing:?}")]
    ConflictingPath { path: String, existing: String },
}

/// A failure detected while dispatching one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Server:http body not have requestId err")]
    MissingRequestId,

    #[error("Server:http request net time too bigger err")]
    NetworkDelay { delay_ms: u64, threshold_ms: u64 },

    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),

    /// The handler panicked; carries the panic payload rendered as text.
    #[error("Server:handler internal err")]
    HandlerFault(String),

    /// The handler was still running at the request deadline.
    #[error("Server:handler timeout err")]
    HandlerTimeout,
}

impl DispatchError {
    /// errCode carried in the response envelope for this failure.
    pub fn err_code(&self) -> u32 {
        match self {
            DispatchError::HandlerFault(_) | DispatchError::HandlerTimeout => ERR_CODE_HANDLER_FAULT,
            _ => ERR_CODE_SERVER,
        }
    }
}

/// Handler-detected bad input.
///
/// Handlers hand this to [`RequestContext::reject`](crate::envelope::RequestContext::reject);
/// it ends up in the envelope exactly like a dispatcher error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: u32,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
