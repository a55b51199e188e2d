//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request (outer → inner)
//!     → recover.rs (panic → 500 + Connection: close)
//!     → metrics.rs (counters, latency, status)
//!     → rate_limit.rs (global token bucket → 429)
//!     → cors.rs (Access-Control-Allow-Origin)
//!     → authenticate.rs (bearer token → Principal)
//!     → routes, then per-route authorize.rs guards
//!     → handler
//! ```
//!
//! # Design Decisions
//! - A stage is a named object that maps a handler to a handler
//! - The pipeline is an ordered list folded from the inside out, so the
//!   first stage listed is the outermost
//! - Stages hold only shared, injected state; nothing global

pub mod authenticate;
pub mod authorize;
pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod recover;

use std::sync::Arc;

use crate::http::handler::Handler;

pub use authenticate::Authenticate;
pub use authorize::Authorizer;
pub use cors::Cors;
pub use metrics::TrackMetrics;
pub use rate_limit::RateLimit;
pub use recover::RecoverPanic;

/// One layer of the request pipeline.
pub trait Stage: Send + Sync {
    /// Short name for logs and introspection.
    fn name(&self) -> &'static str;

    /// Wrap `next` so this stage runs before (and possibly instead of) it.
    fn wrap(&self, next: Handler) -> Handler;
}

/// Ordered stages, outermost first.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside all previously added ones.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Wrap `endpoint` in every stage.
    pub fn compose(&self, endpoint: Handler) -> Handler {
        self.stages
            .iter()
            .rev()
            .fold(endpoint, |next, stage| stage.wrap(next))
    }
}
