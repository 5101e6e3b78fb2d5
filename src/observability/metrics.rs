//! Metrics collection and exposition.
//!
//! # Metrics
//! - `envelope_requests_total` (counter): requests by path, action, err_code
//! - `envelope_request_duration_seconds` (histogram): dispatch latency by path
//! - `envelope_handler_panics_total` (counter): handler faults by path
//!
//! # Design Decisions
//! - Labels use the matched route template, never the raw URL
//! - Recording before `init_metrics` is a no-op

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one answered request.
pub fn record_request(path: &str, action: &str, err_code: u32, start: Instant) {
    counter!(
        "envelope_requests_total",
        "path" => path.to_string(),
        "action" => action.to_string(),
        "err_code" => err_code.to_string()
    )
    .increment(1);
    histogram!("envelope_request_duration_seconds", "path" => path.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a handler that panicked.
pub fn record_handler_panic(path: &str) {
    counter!("envelope_handler_panics_total", "path" => path.to_string()).increment(1);
}
