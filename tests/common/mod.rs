//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use envelope_server::config::ServiceConfig;
use envelope_server::{demo, HttpServer, ResponseEnvelope, RouteTable};
use serde_json::Value;
use tower::ServiceExt;

/// Route table with the sample user services registered.
pub fn demo_routes() -> RouteTable {
    let mut routes = RouteTable::new();
    demo::register(&mut routes).unwrap();
    routes
}

/// Build an in-process router for `routes`.
pub fn router(config: ServiceConfig, routes: RouteTable) -> Router {
    HttpServer::new(config, routes).router()
}

/// Send one request through the router and return the raw response.
pub async fn send(router: &Router, method: &str, path: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

/// Read a response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// POST a JSON value and decode the envelope, asserting HTTP 200.
pub async fn post_json(router: &Router, path: &str, body: Value) -> ResponseEnvelope {
    post_raw(router, path, body.to_string()).await
}

/// POST raw bytes and decode the envelope, asserting HTTP 200.
pub async fn post_raw(router: &Router, path: &str, body: impl Into<Body>) -> ResponseEnvelope {
    let response = send(router, "POST", path, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_text(response).await).unwrap()
}
