//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Store seeding → Service state → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!         → Wait for background tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Background tasks (tasks.rs):
//!     Handler spawns work → registered → deregistered on any exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then state, then listener
//! - Ordered shutdown: stop accept, drain, background tasks, stop
//! - Drain has a deadline; background tasks do not

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::{ServeError, ShutdownOrchestrator, ShutdownState};
pub use signals::{ShutdownReason, Signals};
pub use tasks::{BackgroundTasks, TaskGuard};
