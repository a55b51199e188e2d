//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use service_spine::config::{SeedUser, ServiceConfig};
use service_spine::http::{endpoints, AppState, HttpServer, Routes};
use service_spine::lifecycle::{startup, ServeError, ShutdownOrchestrator, ShutdownReason};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Activated, holds `permissions:read`.
pub const ADA_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAA";
/// Activated, no permissions.
pub const BOB_TOKEN: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBB";
/// Not activated.
pub const CY_TOKEN: &str = "CCCCCCCCCCCCCCCCCCCCCCCCCC";

fn seed(name: &str, activated: bool, permissions: &[&str], token: &str) -> SeedUser {
    SeedUser {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        activated,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        token: Some(token.to_string()),
        token_ttl_hours: 1,
    }
}

/// Ephemeral port, limiter off, three seeded users.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.limiter.enabled = false;
    config.shutdown.grace_period_secs = 1;
    config.seed = vec![
        seed("ada", true, &["permissions:read"], ADA_TOKEN),
        seed("bob", true, &[], BOB_TOKEN),
        seed("cy", false, &["permissions:read"], CY_TOKEN),
    ];
    config
}

/// A server running on a background task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub orchestrator: ShutdownOrchestrator,
    pub client: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("request failed")
    }

    /// Fire the shutdown trigger without waiting for the outcome.
    pub fn trigger_shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn shutdown(mut self) -> Result<(), ServeError> {
        self.trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Start the built-in endpoints.
pub async fn spawn(config: ServiceConfig) -> TestServer {
    spawn_with(config, |state| endpoints::routes(state)).await
}

/// Start a server whose state and routes the caller may adjust.
pub async fn spawn_with<F>(config: ServiceConfig, build: F) -> TestServer
where
    F: FnOnce(&mut AppState) -> Routes,
{
    let mut state = startup::build_state(config);
    let routes = build(&mut state);
    let server = HttpServer::with_routes(state.clone(), routes);
    let orchestrator = server.orchestrator();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(listener, async move {
        let _ = stopped.await;
        ShutdownReason::Requested
    }));

    TestServer {
        addr,
        state,
        orchestrator,
        client: reqwest::Client::new(),
        stop: Some(stop),
        handle,
    }
}
