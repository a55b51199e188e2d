//! Bearer tokens.
//!
//! # Responsibilities
//! - Generate high-entropy plaintext tokens for clients
//! - Hash plaintext for storage and lookup
//! - Validate plaintext shape before any store access
//!
//! # Design Decisions
//! - 16 random bytes, unpadded base32: always 26 characters from `A-Z2-7`
//! - SHA-256 is enough here: tokens are random, not user-chosen passwords

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of every plaintext token.
pub const TOKEN_LENGTH: usize = 26;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Activation,
    Authentication,
}

/// A freshly issued token. `plaintext` is handed to the client once; only
/// `hash` is persisted.
#[derive(Debug, Clone)]
pub struct Token {
    pub plaintext: String,
    pub hash: [u8; 32],
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl Token {
    /// Issue a new token for `user_id`, valid for `ttl`.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let mut random = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut random);
        Self::from_plaintext(BASE32_NOPAD.encode(&random), user_id, ttl, scope)
    }

    /// Wrap an existing plaintext, e.g. one provisioned through configuration.
    pub fn from_plaintext(plaintext: String, user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let hash = hash_plaintext(&plaintext);
        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

/// SHA-256 of the plaintext, the only form a store keeps.
pub fn hash_plaintext(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Why a plaintext token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenShapeError {
    #[error("must be provided")]
    Missing,
    #[error("must be 26 bytes long")]
    Length,
    #[error("must only contain base32 characters")]
    Alphabet,
}

/// Check a plaintext token's shape without touching any store.
pub fn validate_plaintext(plaintext: &str) -> Result<(), TokenShapeError> {
    if plaintext.is_empty() {
        return Err(TokenShapeError::Missing);
    }
    if plaintext.len() != TOKEN_LENGTH {
        return Err(TokenShapeError::Length);
    }
    if !plaintext
        .bytes()
        .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(TokenShapeError::Alphabet);
    }
    Ok(())
}
