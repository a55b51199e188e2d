//! User store contract and the in-memory implementation.
//!
//! # Responsibilities
//! - Resolve a (scope, plaintext token) pair to a non-expired user
//! - Load the permission set granted to a user
//!
//! # Design Decisions
//! - Object-safe trait returning boxed futures, shared as `Arc<dyn UserStore>`
//! - `NotFound` is the only error the spine maps to a client response;
//!   everything else is a server error

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};

use crate::auth::principal::{Permissions, User};
use crate::auth::token::{hash_plaintext, Token, TokenScope};

/// Errors surfaced by a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No matching, unexpired record.
    #[error("record not found")]
    NotFound,
    /// The backing store failed.
    #[error("user store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Lookups the request spine needs from persistence.
pub trait UserStore: Send + Sync {
    /// Find the user owning a non-expired token of `scope`.
    fn get_for_token<'a>(
        &'a self,
        scope: TokenScope,
        plaintext: &'a str,
    ) -> BoxFuture<'a, Result<User, StoreError>>;

    /// All permission codes granted to `user`.
    fn get_all_permissions<'a>(
        &'a self,
        user: &'a User,
    ) -> BoxFuture<'a, Result<Permissions, StoreError>>;
}

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: i64,
    scope: TokenScope,
    expiry: chrono::DateTime<Utc>,
}

/// A thread-safe in-memory store keyed by token hash.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<i64, User>>,
    permissions: Arc<DashMap<i64, Permissions>>,
    tokens: Arc<DashMap<[u8; 32], TokenRecord>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user and return it with its assigned id.
    pub fn create_user(&self, name: &str, email: &str, activated: bool) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User::new(id, name, email, activated);
        self.users.insert(id, user.clone());
        user
    }

    /// Grant permission codes to a user.
    pub fn add_permissions<I, S>(&self, user_id: i64, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = self.permissions.entry(user_id).or_default();
        for code in codes {
            entry.insert(code);
        }
    }

    /// Persist a token's hash.
    pub fn insert_token(&self, token: &Token) {
        self.tokens.insert(
            token.hash,
            TokenRecord {
                user_id: token.user_id,
                scope: token.scope,
                expiry: token.expiry,
            },
        );
    }

    /// Revoke every token of `scope` owned by `user_id`.
    pub fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) {
        self.tokens
            .retain(|_, record| !(record.scope == scope && record.user_id == user_id));
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn lookup(&self, scope: TokenScope, plaintext: &str) -> Result<User, StoreError> {
        let hash = hash_plaintext(plaintext);
        let record = self.tokens.get(&hash).ok_or(StoreError::NotFound)?;
        if record.scope != scope || record.expiry <= Utc::now() {
            return Err(StoreError::NotFound);
        }
        self.users
            .get(&record.user_id)
            .map(|user| user.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

impl UserStore for InMemoryUserStore {
    fn get_for_token<'a>(
        &'a self,
        scope: TokenScope,
        plaintext: &'a str,
    ) -> BoxFuture<'a, Result<User, StoreError>> {
        Box::pin(future::ready(self.lookup(scope, plaintext)))
    }

    fn get_all_permissions<'a>(
        &'a self,
        user: &'a User,
    ) -> BoxFuture<'a, Result<Permissions, StoreError>> {
        let permissions = self
            .permissions
            .get(&user.id)
            .map(|p| p.value().clone())
            .unwrap_or_default();
        Box::pin(future::ready(Ok(permissions)))
    }
}
