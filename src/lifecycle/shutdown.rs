//! Shutdown coordination for the service.
//!
//! # States
//! - Running: listener accepting, requests served
//! - ShuttingDown: trigger received, listener closed, in-flight exchanges
//!   finishing under the grace deadline
//! - Draining: listener drained, waiting for background tasks
//! - Stopped: clean exit
//! - Failed: the listener died on its own or drain missed its deadline
//!
//! # State Transitions
//! ```text
//! Running → ShuttingDown: first termination trigger
//! Running → Failed: listener returned without being asked to
//! ShuttingDown → Draining: listener drained within the grace period
//! ShuttingDown → Failed: grace period elapsed or listener errored
//! Draining → Stopped: background task count reached zero (no deadline)
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{oneshot, watch};

use crate::lifecycle::signals::ShutdownReason;
use crate::lifecycle::tasks::BackgroundTasks;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Draining,
    Stopped,
    Failed,
}

/// Resolves when the listener should stop accepting connections.
pub type StopSignal = BoxFuture<'static, ()>;

/// How serving ended when it did not end cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("listener stopped without a shutdown request")]
    ListenerStopped,
    #[error("listener failed: {0}")]
    Listener(#[source] io::Error),
    #[error("in-flight requests did not finish within {0:?}")]
    DrainTimeout(Duration),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Drives a listener from first request to process exit.
#[derive(Clone)]
pub struct ShutdownOrchestrator {
    state: Arc<watch::Sender<ShutdownState>>,
    tasks: BackgroundTasks,
    grace_period: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(tasks: BackgroundTasks, grace_period: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            state: Arc::new(state),
            tasks,
            grace_period,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn transition(&self, to: ShutdownState) {
        let from = self.state.send_replace(to);
        tracing::debug!(from = ?from, to = ?to, "Shutdown state changed");
    }

    fn fail(&self, err: ServeError) -> Result<(), ServeError> {
        self.transition(ShutdownState::Failed);
        Err(err)
    }

    /// Serve until `trigger` fires, then shut down in order.
    ///
    /// `serve` receives the signal that tells it to stop accepting and must
    /// return a future that resolves once every in-flight exchange is done.
    /// Whichever finishes first, the listener or the trigger, decides the
    /// outcome: a listener that ends on its own is an error.
    pub async fn run<S, F, T>(&self, serve: S, trigger: T) -> Result<(), ServeError>
    where
        S: FnOnce(StopSignal) -> F,
        F: Future<Output = io::Result<()>> + Send + 'static,
        T: Future<Output = ShutdownReason>,
    {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let stop: StopSignal = Box::pin(async move {
            let _ = stop_rx.await;
        });
        let mut serving = tokio::spawn(serve(stop));

        let reason = tokio::select! {
            res = &mut serving => {
                return match res {
                    Ok(Ok(())) => self.fail(ServeError::ListenerStopped),
                    Ok(Err(e)) => self.fail(ServeError::Listener(e)),
                    Err(e) => self.fail(ServeError::Join(e)),
                };
            }
            reason = trigger => reason,
        };

        tracing::info!(signal = %reason, "Caught signal");
        self.transition(ShutdownState::ShuttingDown);
        let _ = stop_tx.send(());

        match tokio::time::timeout(self.grace_period, &mut serving).await {
            Err(_) => {
                serving.abort();
                return self.fail(ServeError::DrainTimeout(self.grace_period));
            }
            Ok(Err(e)) => return self.fail(ServeError::Join(e)),
            Ok(Ok(Err(e))) => return self.fail(ServeError::Listener(e)),
            Ok(Ok(Ok(()))) => {}
        }

        self.transition(ShutdownState::Draining);
        tracing::info!(
            in_flight = self.tasks.in_flight(),
            "Completing background tasks"
        );
        self.tasks.wait_idle().await;

        self.transition(ShutdownState::Stopped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(grace_ms: u64) -> (ShutdownOrchestrator, BackgroundTasks) {
        let tasks = BackgroundTasks::new();
        (
            ShutdownOrchestrator::new(tasks.clone(), Duration::from_millis(grace_ms)),
            tasks,
        )
    }

    #[tokio::test]
    async fn test_clean_shutdown() {
        let (orch, _) = orchestrator(500);
        let (tx, rx) = oneshot::channel();

        let runner = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.run(
                    |stop| async move {
                        stop.await;
                        Ok(())
                    },
                    async move {
                        let _ = rx.await;
                        ShutdownReason::Terminate
                    },
                )
                .await
            })
        };

        assert_eq!(orch.state(), ShutdownState::Running);
        tx.send(()).unwrap();
        runner.await.unwrap().unwrap();
        assert_eq!(orch.state(), ShutdownState::Stopped);
    }

    #[tokio::test]
    async fn test_waits_for_background_tasks() {
        let (orch, tasks) = orchestrator(500);
        let guards: Vec<_> = (0..3).map(|_| tasks.register()).collect();
        let mut states = orch.subscribe();

        let runner = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.run(
                    |stop| async move {
                        stop.await;
                        Ok(())
                    },
                    async { ShutdownReason::Interrupt },
                )
                .await
            })
        };

        states
            .wait_for(|s| *s == ShutdownState::Draining)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orch.state(), ShutdownState::Draining);
        assert!(!runner.is_finished());

        drop(guards);
        runner.await.unwrap().unwrap();
        assert_eq!(orch.state(), ShutdownState::Stopped);
    }

    #[tokio::test]
    async fn test_drain_deadline_is_a_failure() {
        let (orch, _) = orchestrator(100);

        let res = orch
            .run(
                |stop| async move {
                    stop.await;
                    // an in-flight exchange that outlives the grace period
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                },
                async { ShutdownReason::Terminate },
            )
            .await;

        assert!(matches!(res, Err(ServeError::DrainTimeout(_))));
        assert_eq!(orch.state(), ShutdownState::Failed);
    }

    #[tokio::test]
    async fn test_listener_failure_wins_without_signal() {
        let (orch, _) = orchestrator(100);

        let res = orch
            .run(
                |_stop| async move {
                    Err(io::Error::new(io::ErrorKind::AddrInUse, "address in use"))
                },
                std::future::pending::<ShutdownReason>(),
            )
            .await;

        assert!(matches!(res, Err(ServeError::Listener(_))));
        assert_eq!(orch.state(), ShutdownState::Failed);
    }

    #[tokio::test]
    async fn test_listener_returning_early_is_an_error() {
        let (orch, _) = orchestrator(100);

        let res = orch
            .run(
                |_stop| async move { Ok(()) },
                std::future::pending::<ShutdownReason>(),
            )
            .await;

        assert!(matches!(res, Err(ServeError::ListenerStopped)));
    }
}
