//! Envelope request dispatcher.
//!
//! # States
//! ```text
//! Received → Decoded → Identified → TimeChecked → Routed → Executed → Responded
//!     │          │           │             │          │
//!     └──────────┴───────────┴─────────────┴──────────┴──→ Responded (error envelope)
//! ```
//!
//! # Design Decisions
//! - Every failure becomes an error envelope at the point of detection
//! - Lookup uses the matched route template, not the raw URL
//! - Handler panics are caught per request and reported as a handler fault
//! - A handler still running at the request deadline is abandoned and
//!   answered in-band like a fault, never with an HTTP timeout status
//! - Client send time later than arrival counts as zero delay

use axum::body::Bytes;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use tracing::Instrument;

use crate::config::{DispatchConfig, TimeoutConfig};
use crate::envelope::context::{now_ms, FIELD_ACTION, FIELD_REQUEST_ID};
use crate::envelope::{decode, RequestContext, ResponseEnvelope};
use crate::error::{DecodeError, DispatchError};
use crate::observability::{metrics, tracing as request_tracing};
use crate::routing::RouteTable;

/// A request that was answered before (or instead of) a normal handler result.
#[derive(Debug)]
struct Rejection {
    request_id: String,
    error: DispatchError,
}

impl Rejection {
    fn new(request_id: impl Into<String>, error: impl Into<DispatchError>) -> Self {
        Self {
            request_id: request_id.into(),
            error: error.into(),
        }
    }

    fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope::error(self.request_id, self.error.err_code(), self.error.to_string(), None)
    }
}

/// Drives one request from raw body to response envelope.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    config: DispatchConfig,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, config: DispatchConfig) -> Self {
        Self {
            routes,
            config,
            request_timeout: Duration::from_secs(TimeoutConfig::default().request_secs),
        }
    }

    /// Time budget for one request, body read included.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Dispatch a request that arrived now on the route template `path`.
    pub async fn dispatch(&self, path: &str, body: Result<Bytes, DecodeError>) -> ResponseEnvelope {
        self.dispatch_at(path, body, now_ms()).await
    }

    /// Dispatch a request observed at `enter_ms` (epoch milliseconds).
    pub async fn dispatch_at(
        &self,
        path: &str,
        body: Result<Bytes, DecodeError>,
        enter_ms: u64,
    ) -> ResponseEnvelope {
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        self.dispatch_until(path, body, enter_ms, deadline).await
    }

    /// Dispatch a request observed at `enter_ms` whose handler must finish
    /// by `deadline`.
    pub async fn dispatch_until(
        &self,
        path: &str,
        body: Result<Bytes, DecodeError>,
        enter_ms: u64,
        deadline: tokio::time::Instant,
    ) -> ResponseEnvelope {
        let start = Instant::now();
        let span = request_tracing::request_span(path);

        let (envelope, action) = async {
            match self.execute(path, body, enter_ms, deadline, span.clone()).await {
                Ok((ctx, action)) => (ctx.into_envelope(), action),
                Err(rejection) => (rejection.into_envelope(), String::new()),
            }
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| {
            tracing::info!(
                err_code = envelope.err_code,
                err_msg = %envelope.err_msg,
                data = ?envelope.data,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Response sent"
            );
        });
        metrics::record_request(path, &action, envelope.err_code, start);

        envelope
    }

    async fn execute(
        &self,
        path: &str,
        body: Result<Bytes, DecodeError>,
        enter_ms: u64,
        deadline: tokio::time::Instant,
        span: tracing::Span,
    ) -> Result<(RequestContext, String), Rejection> {
        // Received → Decoded
        let document = match body.and_then(|raw| decode(&raw)) {
            Ok(document) => document,
            Err(e) => {
                match &e {
                    DecodeError::Read(reason) => tracing::info!(reason = %reason, "Failed to read request body"),
                    DecodeError::Parse(err) => tracing::error!(error = %err, "Failed to parse request body"),
                }
                return Err(Rejection::new("", e));
            }
        };
        tracing::debug!(req = ?document, "Request decoded");

        let mut ctx = RequestContext::new(path, document, enter_ms).with_span(span.clone());

        // Decoded → Identified
        let request_id = match ctx.str_field(FIELD_REQUEST_ID) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                tracing::info!(req = ?ctx.request(), "Request has no requestId");
                return Err(Rejection::new("", DispatchError::MissingRequestId));
            }
        };
        ctx.set_request_id(request_id.clone());

        // Identified → TimeChecked
        if let Err(e) = check_network_delay(enter_ms, ctx.request_ms(), self.config.net_timeout_ms) {
            tracing::info!(error = ?e, "Request network delay exceeded");
            return Err(Rejection::new(request_id, e));
        }

        // TimeChecked → Routed
        let action = ctx.action().to_string();
        request_tracing::record_action(&span, &action);
        let handler = match self.routes.lookup(path, ctx.str_field(FIELD_ACTION)) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::info!(error = ?e, "No handler for path and action");
                return Err(Rejection::new(request_id, e));
            }
        };

        // Routed → Executed
        let outcome = timeout_at(
            deadline,
            AssertUnwindSafe(async { handler.call(&mut ctx).await }).catch_unwind(),
        )
        .await;

        let Ok(outcome) = outcome else {
            tracing::error!(
                action = %action,
                timeout_ms = self.request_timeout.as_millis() as u64,
                "Handler timed out"
            );
            return Err(Rejection::new(request_id, DispatchError::HandlerTimeout));
        };

        if let Err(panic) = outcome {
            let panic_message = panic_message(&*panic);
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!(
                action = %action,
                panic_message = %panic_message,
                backtrace = %backtrace,
                "Handler panicked"
            );
            metrics::record_handler_panic(path);
            return Err(Rejection::new(request_id, DispatchError::HandlerFault(panic_message)));
        }

        Ok((ctx, action))
    }
}

/// Reject a request whose client send time is too far behind its arrival.
///
/// A zero threshold disables the check.
pub fn check_network_delay(enter_ms: u64, request_ms: u64, threshold_ms: u64) -> Result<(), DispatchError> {
    if threshold_ms == 0 {
        return Ok(());
    }
    let delay_ms = enter_ms.saturating_sub(request_ms);
    if delay_ms > threshold_ms {
        return Err(DispatchError::NetworkDelay { delay_ms, threshold_ms });
    }
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
