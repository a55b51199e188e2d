//! Type-erased request handlers.
//!
//! Every stage of the pipeline and every route endpoint is a [`Handler`]:
//! a cheaply cloneable async function from [`Request`] to [`Response`].
//! Stages are functions from `Handler` to `Handler`.

use std::future::Future;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::http::request::Request;

type HandlerFn = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync + 'static;

/// A shared async request handler.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap any `async fn(Request) -> impl IntoResponse`.
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        Self(Arc::new(move |req| {
            let fut = f(req);
            Box::pin(async move { fut.await.into_response() })
        }))
    }

    /// Invoke the handler.
    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}
