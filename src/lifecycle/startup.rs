//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the user store and seed it from configuration
//! - Construct the shared service state
//! - Bind the listener last, once everything else is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned to `main`, which treats it
//!   as fatal
//! - Seeded tokens are stored hashed like any other token

use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::auth::{InMemoryUserStore, Token, TokenScope};
use crate::config::{SeedUser, ServiceConfig};
use crate::http::AppState;

/// Load `seeds` into `store`. Returns the number of users created.
pub fn seed_store(store: &InMemoryUserStore, seeds: &[SeedUser]) -> usize {
    for seed in seeds {
        let user = store.create_user(&seed.name, &seed.email, seed.activated);
        store.add_permissions(user.id, seed.permissions.iter().cloned());
        if let Some(plaintext) = &seed.token {
            let token = Token::from_plaintext(
                plaintext.clone(),
                user.id,
                chrono::Duration::hours(seed.token_ttl_hours),
                TokenScope::Authentication,
            );
            store.insert_token(&token);
        }
        tracing::debug!(
            user_id = user.id,
            email = %user.email,
            activated = user.activated,
            permissions = seed.permissions.len(),
            "Seeded user"
        );
    }
    seeds.len()
}

/// Build the service state backed by a freshly seeded in-memory store.
pub fn build_state(config: ServiceConfig) -> AppState {
    let store = Arc::new(InMemoryUserStore::new());
    let seeded = seed_store(&store, &config.seed);
    tracing::info!(users = seeded, "User store ready");
    AppState::new(config, store)
}

/// Bind the configured listener address.
pub async fn bind(config: &ServiceConfig) -> io::Result<TcpListener> {
    TcpListener::bind(&config.listener.bind_address).await
}
