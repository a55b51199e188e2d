//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (global token bucket, 429 on empty)
//!     → auth stages (see http::middleware)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - One bucket per process: throttles aggregate load, not individual clients
//! - Fail closed: an empty bucket rejects without touching authentication

pub mod rate_limit;

pub use rate_limit::RateLimiter;
