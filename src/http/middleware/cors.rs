//! Cross-origin header stage.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::http::handler::Handler;
use crate::http::middleware::recover::with_headers_on_unwind;
use crate::http::middleware::Stage;
use crate::http::request::Request;

/// Adds `Access-Control-Allow-Origin` to every response, including the 500
/// written for a panic further in.
#[derive(Clone)]
pub struct Cors {
    allow_origin: HeaderValue,
}

impl Cors {
    pub fn new(allow_origin: HeaderValue) -> Self {
        Self { allow_origin }
    }

    pub fn any() -> Self {
        Self::new(HeaderValue::from_static("*"))
    }
}

impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        Handler::new(move |req: Request| {
            let next = next.clone();
            let headers = headers.clone();
            async move {
                let mut response =
                    with_headers_on_unwind(async move { next.call(req).await }, &headers).await;
                response.headers_mut().extend(headers);
                response
            }
        })
    }
}
