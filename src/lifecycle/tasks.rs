//! Background task accounting.
//!
//! # Responsibilities
//! - Count detached tasks that may outlive the request that started them
//! - Let shutdown wait until that count reaches zero
//! - Contain panics inside background tasks
//!
//! # Design Decisions
//! - Registration is an RAII guard: the count drops on every exit path,
//!   including unwinding
//! - Register before spawning, so a task can never be missed by a shutdown
//!   that starts between spawn and first poll

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Notify;

use crate::observability::logging::panic_message;

#[derive(Debug, Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Process-wide counter of in-flight background tasks.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of background work. Dropping the guard deregisters it.
    pub fn register(&self) -> TaskGuard {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            inner: self.inner.clone(),
        }
    }

    /// Number of registered tasks that have not finished.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Run `task` detached from the caller.
    ///
    /// The task is registered before this returns. A panic inside it is
    /// logged and swallowed so it cannot take the process down.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.register();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                tracing::error!(
                    task = name,
                    panic = %panic_message(panic.as_ref()),
                    "Background task panicked"
                );
            }
        });
    }

    /// Resolve once no tasks are registered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Enlist before checking so a release between the check and the
            // await is not lost.
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps one background task registered while alive.
#[derive(Debug)]
#[must_use = "dropping the guard deregisters the task immediately"]
pub struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
