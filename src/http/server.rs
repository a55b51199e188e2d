//! HTTP server setup.
//!
//! # Responsibilities
//! - Own the process-scoped state every stage and endpoint shares
//! - Compose the standard pipeline around the route table
//! - Mount the result in axum behind request-id and tracing layers
//! - Serve under the shutdown orchestrator
//!
//! # Design Decisions
//! - The whole pipeline is the axum fallback: axum provides the connection
//!   handling, the pipeline owns every status code
//! - Limiter, counters and task tracker are constructed here and injected,
//!   never reached through statics

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{self, HeaderValue};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::UserStore;
use crate::config::ServiceConfig;
use crate::http::endpoints::{self, Outbox};
use crate::http::handler::Handler;
use crate::http::middleware::{Authenticate, Cors, Pipeline, RateLimit, RecoverPanic, TrackMetrics};
use crate::http::request::{Request, X_REQUEST_ID};
use crate::http::routes::Routes;
use crate::lifecycle::{BackgroundTasks, ServeError, ShutdownOrchestrator, ShutdownReason};
use crate::observability::RequestMetrics;
use crate::security::RateLimiter;

/// Process-scoped state shared by stages and endpoints.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<dyn UserStore>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<RequestMetrics>,
    pub tasks: BackgroundTasks,
    pub outbox: Outbox,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, store: Arc<dyn UserStore>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.limiter));
        Self {
            config: Arc::new(config),
            store,
            limiter,
            metrics: Arc::new(RequestMetrics::new()),
            tasks: BackgroundTasks::new(),
            outbox: Outbox::new(),
            started_at: Instant::now(),
        }
    }
}

/// The pipeline every request goes through, outermost first.
pub fn standard_pipeline(state: &AppState) -> Pipeline {
    let allow_origin = HeaderValue::from_str(&state.config.cors.allow_origin).unwrap_or_else(|_| {
        tracing::warn!(
            allow_origin = %state.config.cors.allow_origin,
            "Invalid CORS origin, falling back to *"
        );
        HeaderValue::from_static("*")
    });

    Pipeline::new()
        .stage(RecoverPanic)
        .stage(TrackMetrics::new(state.metrics.clone()))
        .stage(RateLimit::new(
            state.limiter.clone(),
            state.config.limiter.enabled,
        ))
        .stage(Cors::new(allow_origin))
        .stage(Authenticate::new(state.store.clone()))
}

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    state: AppState,
    orchestrator: ShutdownOrchestrator,
}

impl HttpServer {
    /// Serve the built-in endpoints.
    pub fn new(state: AppState) -> Self {
        let routes = endpoints::routes(&state);
        Self::with_routes(state, routes)
    }

    /// Serve `routes` behind the standard pipeline.
    pub fn with_routes(state: AppState, routes: Routes) -> Self {
        let pipeline = standard_pipeline(&state);
        tracing::debug!(stages = ?pipeline.names(), "Pipeline composed");
        let handler = pipeline.compose(routes.into_handler());

        let grace = Duration::from_secs(state.config.shutdown.grace_period_secs);
        let orchestrator = ShutdownOrchestrator::new(state.tasks.clone(), grace);

        Self {
            router: Self::build_router(handler),
            state,
            orchestrator,
        }
    }

    fn build_router(handler: Handler) -> Router {
        Router::new()
            .fallback(move |req: axum::extract::Request| {
                let handler = handler.clone();
                async move { handler.call(Request::new(req)).await }
            })
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &http::Request<Body>| {
                    let request_id = req
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The axum router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handle for observing shutdown progress.
    pub fn orchestrator(&self) -> ShutdownOrchestrator {
        self.orchestrator.clone()
    }

    /// Serve on `listener` until `trigger` fires, then shut down gracefully.
    pub async fn run<T>(self, listener: TcpListener, trigger: T) -> Result<(), ServeError>
    where
        T: Future<Output = ShutdownReason>,
    {
        let addr = listener.local_addr().map_err(ServeError::Listener)?;
        tracing::info!(
            address = %addr,
            env = self.state.config.listener.env.as_str(),
            "Starting server"
        );

        let router = self.router;
        let result = self
            .orchestrator
            .run(
                move |stop| {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(stop)
                        .into_future()
                },
                trigger,
            )
            .await;

        if result.is_ok() {
            tracing::info!(address = %addr, "Stopped server");
        }
        result
    }
}
