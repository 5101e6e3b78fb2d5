//! Handler abstraction invoked by the dispatcher.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::envelope::RequestContext;

/// Future returned by [`Handler::call`], borrowing the context for its lifetime.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Application logic bound to a (path, action) route.
///
/// A handler reads the decoded request from the context and writes its
/// output or error state back into it. It never writes the HTTP response.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> HandlerFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`Handler`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut RequestContext) + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> HandlerFuture<'a> {
        (self.f)(ctx);
        Box::pin(std::future::ready(()))
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Wrap a synchronous closure as a handler.
///
/// ```ignore
/// table.register("api/ping", NO_ACTION, Methods::Post, handler_fn(|ctx| {
///     ctx.set_data(serde_json::json!("pong"));
/// }))?;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut RequestContext) + Send + Sync + 'static,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    struct Echo;

    impl Handler for Echo {
        fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> HandlerFuture<'a> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                let echoed = ctx.str_field("msg").unwrap_or_default().to_string();
                ctx.set_data(json!({ "msg": echoed }));
            })
        }
    }

    #[tokio::test]
    async fn test_async_handler_mutates_context() {
        let mut doc = Map::new();
        doc.insert("msg".into(), json!("hi"));
        let mut ctx = RequestContext::new("/echo", doc, 0);

        Echo.call(&mut ctx).await;
        assert_eq!(ctx.data(), Some(&json!({"msg": "hi"})));
    }

    #[tokio::test]
    async fn test_handler_fn() {
        let handler = handler_fn(|ctx: &mut RequestContext| ctx.set_err_msg(7, "seven"));
        let mut ctx = RequestContext::new("/x", Map::new(), 0);

        handler.call(&mut ctx).await;
        assert_eq!(ctx.err_code(), 7);
        assert_eq!(ctx.err_msg(), "seven");
    }
}
