//! Per-route access guards.
//!
//! Unlike the pipeline stages these wrap a single endpoint, chosen when the
//! route table is built. Each guard nests the weaker one:
//!
//! ```text
//! require_permission(code) = require_activated(permission check)
//! require_activated        = require_authenticated(activation check)
//! ```
//!
//! so an anonymous caller always sees 401 before any 403.

use std::sync::Arc;

use crate::auth::{Principal, UserStore};
use crate::http::handler::Handler;
use crate::http::request::Request;
use crate::http::response::{
    authentication_required_response, inactive_account_response, not_permitted_response,
    server_error_response,
};

/// Builds guarded handlers. Needs the store for permission lookups.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn UserStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Reject anonymous callers with 401.
    // Only anonymity is checked here; activation is left to `require_activated`.
    pub fn require_authenticated(&self, next: Handler) -> Handler {
        Handler::new(move |req: Request| {
            let next = next.clone();
            async move {
                if req.principal().is_anonymous() {
                    return authentication_required_response(&req.meta());
                }
                next.call(req).await
            }
        })
    }

    /// Reject anonymous callers with 401 and unactivated users with 403.
    pub fn require_activated(&self, next: Handler) -> Handler {
        let activated = Handler::new(move |req: Request| {
            let next = next.clone();
            async move {
                if !req.principal().is_activated() {
                    return inactive_account_response(&req.meta());
                }
                next.call(req).await
            }
        });
        self.require_authenticated(activated)
    }

    /// Additionally require the user to hold permission `code`.
    pub fn require_permission(&self, code: impl Into<String>, next: Handler) -> Handler {
        let code: Arc<str> = Arc::from(code.into());
        let store = self.store.clone();
        let permitted = Handler::new(move |req: Request| {
            let next = next.clone();
            let store = store.clone();
            let code = code.clone();
            async move {
                let user = match req.principal() {
                    Principal::User(user) => user.clone(),
                    Principal::Anonymous => return authentication_required_response(&req.meta()),
                };
                match store.get_all_permissions(&user).await {
                    Ok(permissions) if permissions.include(&code) => next.call(req).await,
                    Ok(_) => {
                        tracing::debug!(user_id = user.id, permission = %code, "Permission denied");
                        not_permitted_response(&req.meta())
                    }
                    Err(e) => server_error_response(&req.meta(), &e),
                }
            }
        });
        self.require_activated(permitted)
    }
}
