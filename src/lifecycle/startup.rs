//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Freeze the route table into the HTTP server
//! - Bind the listener and serve until shutdown
//!
//! Listeners start last, so traffic only arrives once every route is registered.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::RouteTable;

/// Fatal error while bringing the server up or running it.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Serve `routes` with `config` until `shutdown` is triggered.
pub async fn serve(
    config: ServiceConfig,
    routes: RouteTable,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    for key in routes.keys() {
        tracing::info!(route = %key, "Serving route");
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let server = HttpServer::new(config, routes);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
