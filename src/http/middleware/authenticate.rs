//! Bearer token authentication stage.
//!
//! # Responsibilities
//! - Attach a [`Principal`] to every request that reaches the router
//! - Reject malformed or unknown bearer tokens with 401
//!
//! # Design Decisions
//! - No `Authorization` header is not an error: the request proceeds as
//!   anonymous and per-route guards decide
//! - A malformed token and an unknown token get the same response so the
//!   two cannot be told apart from outside
//! - `Vary: Authorization` is added to every response, rejected or not,
//!   including the 500 for a panic further in

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;

use crate::auth::{validate_plaintext, Principal, StoreError, TokenScope, UserStore};
use crate::http::handler::Handler;
use crate::http::middleware::recover::with_headers_on_unwind;
use crate::http::middleware::Stage;
use crate::http::request::Request;
use crate::http::response::{invalid_authentication_token_response, server_error_response};

#[derive(Clone)]
pub struct Authenticate {
    store: Arc<dyn UserStore>,
}

impl Authenticate {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let store = self.store.clone();
        let mut vary = HeaderMap::new();
        vary.insert(header::VARY, HeaderValue::from_static("Authorization"));
        Handler::new(move |req: Request| {
            let next = next.clone();
            let store = store.clone();
            let vary = vary.clone();
            async move {
                let mut response =
                    with_headers_on_unwind(authenticate(store.as_ref(), next, req), &vary).await;
                for (name, value) in vary.iter() {
                    response.headers_mut().append(name.clone(), value.clone());
                }
                response
            }
        })
    }
}

/// Extract the token from `Bearer <token>`; anything else is malformed.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

async fn authenticate(store: &dyn UserStore, next: Handler, mut req: Request) -> Response {
    let token = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match bearer_token(value) {
            Some(token) => Some(token.to_owned()),
            None => return invalid_authentication_token_response(&req.meta()),
        },
    };
    let Some(token) = token else {
        req.set_principal(Principal::Anonymous);
        return next.call(req).await;
    };

    if let Err(e) = validate_plaintext(&token) {
        tracing::debug!(reason = %e, "Rejected malformed bearer token");
        return invalid_authentication_token_response(&req.meta());
    }

    match store.get_for_token(TokenScope::Authentication, &token).await {
        Ok(user) => {
            req.set_principal(Principal::from(user));
            next.call(req).await
        }
        Err(StoreError::NotFound) => invalid_authentication_token_response(&req.meta()),
        Err(e) => server_error_response(&req.meta(), &e),
    }
}
