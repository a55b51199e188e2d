//! Request principals and permission sets.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user created now.
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>, activated: bool) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            activated,
            created_at: Utc::now(),
        }
    }
}

/// The identity attached to a single request.
///
/// `Anonymous` is the sentinel for requests without credentials: it has no
/// permissions and is never activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(Arc<User>),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    /// Anonymous principals are never activated.
    pub fn is_activated(&self) -> bool {
        match self {
            Principal::Anonymous => false,
            Principal::User(user) => user.activated,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
        }
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal::User(Arc::new(user))
    }
}

/// Permission codes granted to a user, e.g. `"movies:write"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `code` was granted.
    pub fn include(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn insert(&mut self, code: impl Into<String>) {
        self.0.insert(code.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
