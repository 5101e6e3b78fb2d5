//! Envelope server binary.
//!
//! Serves the sample user services over the envelope protocol.
//!
//! ```text
//!     Client Request ──▶ axum route (path) ──▶ dispatcher ──▶ route table (path, action)
//!                                                  │                     │
//!     Client Response ◀── envelope (HTTP 200) ◀────┴──── handler(ctx) ◀──┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use envelope_server::config::{load_config, ServiceConfig};
use envelope_server::lifecycle::{self, signals, Shutdown};
use envelope_server::observability::logging;
use envelope_server::{demo, RouteTable};

#[derive(Parser)]
#[command(name = "envelope-server")]
#[command(about = "JSON envelope dispatch server", long_about = None)]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level)?;

    tracing::info!("envelope-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        net_timeout_ms = config.dispatch.net_timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let mut routes = RouteTable::new();
    demo::register(&mut routes)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    lifecycle::serve(config, routes, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
