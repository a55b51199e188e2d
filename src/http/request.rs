//! Request-scoped context.
//!
//! # Responsibilities
//! - Carry the inbound HTTP request through the pipeline
//! - Hold the principal resolved by the authentication stage
//!
//! # Design Decisions
//! - The principal is a typed field next to the request, not a type-erased
//!   extension or a task-local
//! - Reading the principal before authentication ran is a wiring bug and
//!   panics; the panic containment stage turns that into a 500

use axum::body::Body;
use axum::http::{self, HeaderMap, Method, Uri};

use crate::auth::Principal;

/// Header carrying the request id set by the outer tower layers.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An inbound request plus its resolved principal.
#[derive(Debug)]
pub struct Request {
    inner: http::Request<Body>,
    principal: Option<Principal>,
}

impl Request {
    /// Wrap a request that has not been authenticated yet.
    pub fn new(inner: http::Request<Body>) -> Self {
        Self {
            inner,
            principal: None,
        }
    }

    /// Attach the principal, replacing any earlier one.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.set_principal(principal);
        self
    }

    /// The principal attached by the authentication stage.
    ///
    /// # Panics
    ///
    /// Panics if no principal was attached.
    pub fn principal(&self) -> &Principal {
        match &self.principal {
            Some(principal) => principal,
            None => panic!("missing principal in request context"),
        }
    }

    pub fn try_principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }

    /// Method and URL, captured before the request moves downstream.
    pub fn meta(&self) -> RequestMeta {
        RequestMeta {
            method: self.method().clone(),
            uri: self.uri().clone(),
        }
    }

    pub fn into_body(self) -> Body {
        self.inner.into_body()
    }
}

/// What server-side error logs need to know about a request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
}
