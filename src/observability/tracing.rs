//! Per-request spans.
//!
//! The span is opened before the body is decoded, so `request_id` starts
//! empty and is recorded once the dispatcher has validated it.

use tracing::{field, Span};

/// Open the span a single envelope request runs under.
pub fn request_span(path: &str) -> Span {
    tracing::info_span!("request", path = %path, request_id = field::Empty, action = field::Empty)
}

/// Record the effective action on a request span.
pub fn record_action(span: &Span, action: &str) {
    span.record("action", action);
}
