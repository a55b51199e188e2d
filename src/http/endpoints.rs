//! Built-in endpoints.
//!
//! # Endpoints
//! - `GET /v1/healthcheck`: liveness plus environment and version
//! - `GET /debug/vars`: request counters and runtime figures
//! - `GET /v1/me`: the calling user (activated accounts only)
//! - `GET /v1/permissions`: the caller's permission codes
//!   (requires `permissions:read`)
//! - `POST /v1/me/notifications`: queue a notification for the caller,
//!   delivered by a background task

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::handler::Handler;
use crate::http::middleware::Authorizer;
use crate::http::request::Request;
use crate::http::response::{
    authentication_required_response, bad_request_response, failed_validation_response,
    server_error_response,
};
use crate::http::routes::Routes;
use crate::http::server::AppState;
use crate::observability::MetricsSnapshot;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_MESSAGE_BYTES: usize = 500;

/// Permission required to list one's own permissions.
pub const PERMISSIONS_READ: &str = "permissions:read";

/// The route table served by the binary.
pub fn routes(state: &AppState) -> Routes {
    let guard = Authorizer::new(state.store.clone());
    Routes::new()
        .get("/v1/healthcheck", healthcheck(state))
        .get("/debug/vars", debug_vars(state))
        .get("/v1/me", guard.require_activated(Handler::new(show_current_user)))
        .get(
            "/v1/permissions",
            guard.require_permission(PERMISSIONS_READ, list_permissions(state)),
        )
        .post(
            "/v1/me/notifications",
            guard.require_activated(queue_notification(state)),
        )
}

fn healthcheck(state: &AppState) -> Handler {
    let environment = state.config.listener.env;
    Handler::new(move |_req: Request| async move {
        Json(json!({
            "status": "available",
            "system_info": {
                "environment": environment.as_str(),
                "version": VERSION,
            },
        }))
    })
}

#[derive(Serialize)]
struct DebugVars {
    version: &'static str,
    timestamp: i64,
    uptime_seconds: u64,
    background_tasks: usize,
    #[serde(flatten)]
    requests: MetricsSnapshot,
}

fn debug_vars(state: &AppState) -> Handler {
    let state = state.clone();
    Handler::new(move |_req: Request| {
        let vars = DebugVars {
            version: VERSION,
            timestamp: chrono::Utc::now().timestamp(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            background_tasks: state.tasks.in_flight(),
            requests: state.metrics.snapshot(),
        };
        async move { Json(vars) }
    })
}

async fn show_current_user(req: Request) -> Response {
    match req.principal().user() {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => authentication_required_response(&req.meta()),
    }
}

fn list_permissions(state: &AppState) -> Handler {
    let store = state.store.clone();
    Handler::new(move |req: Request| {
        let store = store.clone();
        async move {
            let Some(user) = req.principal().user().cloned() else {
                return authentication_required_response(&req.meta());
            };
            match store.get_all_permissions(&user).await {
                Ok(permissions) => {
                    let mut codes: Vec<&str> = permissions.iter().collect();
                    codes.sort_unstable();
                    Json(json!({ "permissions": codes })).into_response()
                }
                Err(e) => server_error_response(&req.meta(), &e),
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotificationInput {
    message: String,
}

fn validate_notification(input: &NotificationInput) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if input.message.trim().is_empty() {
        errors.insert("message".to_string(), "must be provided".to_string());
    } else if input.message.len() > MAX_MESSAGE_BYTES {
        errors.insert(
            "message".to_string(),
            format!("must not be more than {MAX_MESSAGE_BYTES} bytes long"),
        );
    }
    errors
}

fn queue_notification(state: &AppState) -> Handler {
    let state = state.clone();
    Handler::new(move |req: Request| {
        let state = state.clone();
        async move {
            let meta = req.meta();
            let Some(user_id) = req.principal().user().map(|u| u.id) else {
                return authentication_required_response(&meta);
            };

            let body = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
                Ok(body) => body,
                Err(e) => return bad_request_response(&meta, &e),
            };
            let input: NotificationInput = match serde_json::from_slice(&body) {
                Ok(input) => input,
                Err(e) => return bad_request_response(&meta, &e),
            };
            let errors = validate_notification(&input);
            if !errors.is_empty() {
                return failed_validation_response(&meta, &errors);
            }

            let outbox = state.outbox.clone();
            state.tasks.spawn("deliver_notification", async move {
                outbox.deliver(user_id, input.message).await;
            });

            (
                StatusCode::ACCEPTED,
                Json(json!({ "message": "notification queued for delivery" })),
            )
                .into_response()
        }
    })
}

/// Delivered notifications, per user.
///
/// Stands in for an outbound mail relay: delivery takes `delivery_delay`
/// and is recorded in memory.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    delivered: Arc<DashMap<i64, Vec<String>>>,
    delivery_delay: Duration,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delivery_delay: Duration) -> Self {
        Self {
            delivered: Arc::default(),
            delivery_delay,
        }
    }

    pub async fn deliver(&self, user_id: i64, message: String) {
        if !self.delivery_delay.is_zero() {
            tokio::time::sleep(self.delivery_delay).await;
        }
        self.delivered.entry(user_id).or_default().push(message);
        tracing::info!(user_id, "Notification delivered");
    }

    /// Messages delivered to `user_id`, oldest first.
    pub fn delivered_to(&self, user_id: i64) -> Vec<String> {
        self.delivered
            .get(&user_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default()
    }
}
