//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, request id, trace span)
//!     → request.rs (wrap request, principal slot)
//!     → middleware/ (standard pipeline, outermost first)
//!     → routes.rs (exact path + method, 404 / 405)
//!     → endpoints.rs (per-route guards, then the endpoint)
//!     → response.rs (error envelope)
//!     → Send to client
//! ```

pub mod endpoints;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use handler::Handler;
pub use request::{Request, RequestMeta, X_REQUEST_ID};
pub use routes::Routes;
pub use server::{AppState, HttpServer};
