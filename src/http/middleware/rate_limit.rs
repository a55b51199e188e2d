//! Rate limiting stage.
//!
//! Runs before authentication: a throttled request is rejected with 429
//! without ever touching the user store.

use std::sync::Arc;

use crate::http::handler::Handler;
use crate::http::middleware::Stage;
use crate::http::request::Request;
use crate::http::response::rate_limit_exceeded_response;
use crate::security::RateLimiter;

#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    enabled: bool,
}

impl RateLimit {
    /// When `enabled` is false the limiter is never consulted.
    pub fn new(limiter: Arc<RateLimiter>, enabled: bool) -> Self {
        Self { limiter, enabled }
    }
}

impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn wrap(&self, next: Handler) -> Handler {
        if !self.enabled {
            return next;
        }
        let limiter = self.limiter.clone();
        Handler::new(move |req: Request| {
            let next = next.clone();
            let admitted = limiter.allow();
            async move {
                if !admitted {
                    tracing::warn!(
                        method = %req.method(),
                        path = %req.uri().path(),
                        "Rate limit exceeded"
                    );
                    return rate_limit_exceeded_response(&req.meta());
                }
                next.call(req).await
            }
        })
    }
}
