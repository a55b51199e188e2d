//! Request-handling spine for a networked service.
//!
//! Authentication, authorization, rate limiting, panic containment and
//! request metrics composed as a pipeline around ordinary handlers, plus a
//! shutdown orchestrator that drains the listener and waits for background
//! work before the process exits.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::{ShutdownOrchestrator, ShutdownState};
