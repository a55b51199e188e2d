//! Request metrics stage.
//!
//! Counts every request on the way in and every response on the way out,
//! using the status code the inner stages actually produced. Never changes
//! the response. A panic is counted as the 500 the panic stage will write
//! and then re-raised; a request whose client went away is counted as
//! received but not sent.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::FutureExt;

use crate::http::handler::Handler;
use crate::http::middleware::Stage;
use crate::http::request::Request;
use crate::observability::RequestMetrics;

#[derive(Clone)]
pub struct TrackMetrics {
    metrics: Arc<RequestMetrics>,
}

impl TrackMetrics {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }
}

impl Stage for TrackMetrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let metrics = self.metrics.clone();
        Handler::new(move |req: Request| {
            let next = next.clone();
            let metrics = metrics.clone();
            async move {
                metrics.record_received();
                let start = Instant::now();
                let downstream = AssertUnwindSafe(async move { next.call(req).await });
                match downstream.catch_unwind().await {
                    Ok(response) => {
                        metrics.record_sent(response.status().as_u16(), start.elapsed());
                        response
                    }
                    Err(panic) => {
                        // The panic stage outside answers with a 500.
                        metrics.record_sent(
                            StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                            start.elapsed(),
                        );
                        panic::resume_unwind(panic)
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::RecoverPanic;
    use axum::body::Body;
    use axum::http;
    use axum::response::IntoResponse;

    fn request(path: &str) -> Request {
        Request::new(
            http::Request::builder()
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_counts_actual_status_codes() {
        let metrics = Arc::new(RequestMetrics::new());
        let handler = TrackMetrics::new(metrics.clone()).wrap(Handler::new(|req: Request| async move {
            match req.uri().path() {
                "/missing" => StatusCode::NOT_FOUND.into_response(),
                "/teapot" => StatusCode::IM_A_TEAPOT.into_response(),
                _ => "ok".into_response(),
            }
        }));

        for path in ["/a", "/missing", "/b", "/teapot", "/missing"] {
            handler.call(request(path)).await;
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests_received, 5);
        assert_eq!(snap.total_responses_sent, 5);
        assert_eq!(snap.total_responses_sent_by_status.values().sum::<u64>(), 5);
        assert_eq!(metrics.responses_with_status(200), 2);
        assert_eq!(metrics.responses_with_status(404), 2);
        assert_eq!(metrics.responses_with_status(418), 1);
    }

    #[tokio::test]
    async fn test_panics_are_counted_as_500() {
        let metrics = Arc::new(RequestMetrics::new());
        let inner = TrackMetrics::new(metrics.clone()).wrap(Handler::new(|_req: Request| async {
            if true {
                panic!("boom");
            }
            "unreachable"
        }));
        let handler = RecoverPanic.wrap(inner);

        let response = handler.call(request("/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(metrics.requests_received(), 1);
        assert_eq!(metrics.responses_sent(), 1);
        assert_eq!(metrics.responses_with_status(500), 1);
    }
}
