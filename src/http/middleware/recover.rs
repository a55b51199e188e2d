//! Panic containment.
//!
//! Outermost stage. A panic anywhere inside the pipeline, on the task
//! serving this request, becomes a generic 500 with `Connection: close`.
//! Work spawned onto other tasks is not covered; see
//! [`BackgroundTasks::spawn`](crate::lifecycle::BackgroundTasks::spawn).
//!
//! Stages that promise a response header on every outcome run their inner
//! call through `with_headers_on_unwind`. A panic passing through them then
//! carries those headers, and the 500 written here includes them.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use futures_util::FutureExt;

use crate::http::handler::Handler;
use crate::http::middleware::Stage;
use crate::http::request::Request;
use crate::http::response::server_error_response;
use crate::observability::logging::panic_message;

#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverPanic;

impl Stage for RecoverPanic {
    fn name(&self) -> &'static str {
        "recover_panic"
    }

    fn wrap(&self, next: Handler) -> Handler {
        Handler::new(move |req: Request| {
            let next = next.clone();
            async move {
                let meta = req.meta();
                // The handler is invoked inside the guarded future so that a
                // panic before its first await is caught too.
                let guarded = AssertUnwindSafe(async move { next.call(req).await });
                match guarded.catch_unwind().await {
                    Ok(response) => response,
                    Err(panic) => {
                        let (carried, panic) = match panic.downcast::<UnwindHeaders>() {
                            Ok(unwind) => (unwind.headers, unwind.payload),
                            Err(panic) => (HeaderMap::new(), panic),
                        };
                        let err = format!("panic: {}", panic_message(panic.as_ref()));
                        let mut response = server_error_response(&meta, &err);
                        let headers = response.headers_mut();
                        for (name, value) in carried.iter() {
                            headers.append(name.clone(), value.clone());
                        }
                        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
                        response
                    }
                }
            }
        })
    }
}

/// Panic payload wrapped with the headers of every stage it unwound through.
struct UnwindHeaders {
    headers: HeaderMap,
    payload: Box<dyn Any + Send>,
}

/// Await `inner`; if it panics, re-raise with `headers` attached.
pub(crate) async fn with_headers_on_unwind<F>(inner: F, headers: &HeaderMap) -> Response
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(inner).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let unwind = match payload.downcast::<UnwindHeaders>() {
                Ok(mut unwind) => {
                    for (name, value) in headers.iter() {
                        unwind.headers.append(name.clone(), value.clone());
                    }
                    unwind
                }
                Err(payload) => Box::new(UnwindHeaders {
                    headers: headers.clone(),
                    payload,
                }),
            };
            panic::resume_unwind(unwind)
        }
    }
}
