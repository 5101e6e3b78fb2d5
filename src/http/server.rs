//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with one route per registered path
//! - Mount each path under its registered methods (POST, GET or both)
//! - Wire up middleware (tracing)
//! - Stamp the arrival time and request deadline before reading the body
//! - Read the body and hand it to the dispatcher with the matched path
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - The request timeout is enforced in-band: a slow upload becomes a read
//!   error envelope, a slow handler a timeout envelope, both with HTTP 200

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout_at;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::envelope::context::now_ms;
use crate::envelope::ResponseEnvelope;
use crate::error::DecodeError;
use crate::http::dispatcher::Dispatcher;
use crate::routing::{Methods, RouteTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_size: usize,
}

/// HTTP server hosting the envelope dispatcher.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server serving the routes in `routes`.
    ///
    /// The table is frozen from here on.
    pub fn new(config: ServiceConfig, routes: RouteTable) -> Self {
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::new(routes), config.dispatch)
                .with_request_timeout(Duration::from_secs(config.timeouts.request_secs)),
        );

        let state = AppState {
            dispatcher: dispatcher.clone(),
            max_body_size: config.limits.max_body_size,
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mut router = Router::new();
        for (path, methods) in state.dispatcher.routes().mounts() {
            router = router.route(path, method_router(methods));
        }

        router
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.routes().len(),
            net_timeout_ms = self.config.dispatch.net_timeout_ms,
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// A clone of the router, for driving the server in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

fn method_router(methods: Methods) -> MethodRouter<AppState> {
    match methods {
        Methods::Post => post(envelope_handler),
        Methods::Get => get(envelope_handler),
        Methods::Both => post(envelope_handler).get(envelope_handler),
    }
}

/// Entry point for every registered path.
async fn envelope_handler(
    State(state): State<AppState>,
    matched: MatchedPath,
    request: Request<Body>,
) -> ResponseEnvelope {
    let enter_ms = now_ms();
    let deadline = tokio::time::Instant::now() + state.dispatcher.request_timeout();

    let body = match timeout_at(deadline, axum::body::to_bytes(request.into_body(), state.max_body_size)).await {
        Ok(read) => read.map_err(|e| DecodeError::Read(e.to_string())),
        Err(_) => Err(DecodeError::Read("body read timed out".to_string())),
    };

    state
        .dispatcher
        .dispatch_until(matched.as_str(), body, enter_ms, deadline)
        .await
}
