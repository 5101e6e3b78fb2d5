//! JSON envelope dispatch server.
//!
//! Requests are JSON objects carrying a `requestId`, an optional `requestMs`
//! send time and an optional `action`. The handler is chosen by the matched
//! URL path together with that body `action`, and every answer is the same
//! HTTP 200 envelope: `{"requestId", "errCode", "errMsg", "data"}`.
//!
//! Routing on a body field rather than on the URL is unusual for HTTP; two
//! requests to the same URL can reach different handlers.

pub mod client;
pub mod config;
pub mod demo;
pub mod envelope;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServiceConfig;
pub use envelope::{RequestContext, ResponseEnvelope, NO_ACTION};
pub use http::{Dispatcher, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{handler_fn, Handler, Methods, RouteTable};
