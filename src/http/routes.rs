//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Map (method, exact path) to an endpoint handler
//! - Answer unknown paths with 404 and known paths with the wrong method
//!   with 405 plus `Allow`
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Exact path matching only; no parameters or prefixes
//! - Route misses go through the same error envelope as every other error

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::http::handler::Handler;
use crate::http::request::Request;
use crate::http::response::{method_not_allowed_response, not_found_response};

/// Result of looking up a request.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found(&'a Handler),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Route table keyed by path, then method.
#[derive(Clone, Default)]
pub struct Routes {
    table: HashMap<String, Vec<(Method, Handler)>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path`. A later registration for the
    /// same pair replaces the earlier one.
    pub fn route(mut self, method: Method, path: &str, handler: Handler) -> Self {
        let entries = self.table.entry(path.to_string()).or_default();
        entries.retain(|(m, _)| *m != method);
        entries.push((method, handler));
        self
    }

    pub fn get(self, path: &str, handler: Handler) -> Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: Handler) -> Self {
        self.route(Method::POST, path, handler)
    }

    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let Some(entries) = self.table.get(path) else {
            return RouteMatch::NotFound;
        };
        match entries.iter().find(|(m, _)| m == method) {
            Some((_, handler)) => RouteMatch::Found(handler),
            None => RouteMatch::MethodNotAllowed(entries.iter().map(|(m, _)| m.clone()).collect()),
        }
    }

    /// Collapse the table into a single dispatching handler.
    pub fn into_handler(self) -> Handler {
        let routes = Arc::new(self);
        Handler::new(move |req: Request| {
            let routes = routes.clone();
            async move {
                let handler = match routes.lookup(req.method(), req.uri().path()) {
                    RouteMatch::Found(handler) => handler.clone(),
                    RouteMatch::MethodNotAllowed(allowed) => {
                        return method_not_allowed_response(&req.meta(), &allowed)
                    }
                    RouteMatch::NotFound => return not_found_response(&req.meta()),
                };
                handler.call(req).await
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, header, StatusCode};

    fn routes() -> Routes {
        Routes::new()
            .get("/v1/healthcheck", Handler::new(|_req: Request| async { "up" }))
            .post("/v1/items", Handler::new(|_req: Request| async { StatusCode::CREATED }))
            .get("/v1/items", Handler::new(|_req: Request| async { "items" }))
    }

    fn request(method: Method, path: &str) -> Request {
        Request::new(
            http::Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
    }

    #[test]
    fn test_lookup() {
        let routes = routes();
        assert!(matches!(
            routes.lookup(&Method::GET, "/v1/healthcheck"),
            RouteMatch::Found(_)
        ));
        assert!(matches!(
            routes.lookup(&Method::GET, "/v1/healthcheck/"),
            RouteMatch::NotFound
        ));
        match routes.lookup(&Method::DELETE, "/v1/items") {
            RouteMatch::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::POST, Method::GET]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_statuses() {
        let handler = routes().into_handler();

        let found = handler.call(request(Method::POST, "/v1/items")).await;
        assert_eq!(found.status(), StatusCode::CREATED);

        let missing = handler.call(request(Method::GET, "/nope")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let wrong = handler.call(request(Method::PUT, "/v1/healthcheck")).await;
        assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(wrong.headers()[header::ALLOW], "GET");
    }

    #[test]
    fn test_reregistering_replaces() {
        let routes = routes().get("/v1/items", Handler::new(|_req: Request| async { "v2" }));
        match routes.lookup(&Method::PUT, "/v1/items") {
            RouteMatch::MethodNotAllowed(allowed) => assert_eq!(allowed.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
