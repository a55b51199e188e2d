//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → token.rs (shape check, SHA-256 hash)
//!     → store.rs (UserStore lookup by scope + hash)
//!     → principal.rs (Principal attached to the request)
//! ```
//!
//! # Design Decisions
//! - Only token hashes are ever stored; plaintext leaves with the client
//! - The store is a trait so persistence stays outside the request spine
//! - Anonymous is a variant, not a user row

pub mod principal;
pub mod store;
pub mod token;

pub use principal::{Permissions, Principal, User};
pub use store::{InMemoryUserStore, StoreError, UserStore};
pub use token::{validate_plaintext, Token, TokenScope, TokenShapeError, TOKEN_LENGTH};
