//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests received and responses sent
//! - Accumulate processing time in microseconds
//! - Count responses by the status code actually written
//! - Optionally expose everything to Prometheus
//!
//! # Metrics
//! - `http_requests_received_total` (counter)
//! - `http_responses_sent_total` (counter): by status
//! - `http_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - In-process counters are atomics owned by the service, not statics
//! - The `metrics` facade is fed alongside so an exporter is optional

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

/// Request counters for one service instance.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    by_status: DashMap<u16, AtomicU64>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before the request is handed downstream.
    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        counter!("http_requests_received_total").increment(1);
    }

    /// Called once a response with `status` has been produced.
    pub fn record_sent(&self, status: u16, elapsed: Duration) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_time_us.fetch_add(micros, Ordering::Relaxed);
        self.by_status
            .entry(status)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);

        counter!("http_responses_sent_total", "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn requests_received(&self) -> u64 {
        self.requests_received.load(Ordering::Relaxed)
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    pub fn processing_time_us(&self) -> u64 {
        self.processing_time_us.load(Ordering::Relaxed)
    }

    /// Responses sent with `status` so far.
    pub fn responses_with_status(&self, status: u16) -> u64 {
        self.by_status
            .get(&status)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests_received: self.requests_received(),
            total_responses_sent: self.responses_sent(),
            total_processing_time_microseconds: self.processing_time_us(),
            total_responses_sent_by_status: self
                .by_status
                .iter()
                .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Point-in-time copy of [`RequestMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_microseconds: u64,
    pub total_responses_sent_by_status: BTreeMap<String, u64>,
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let m = RequestMetrics::new();
        for status in [200, 200, 404, 429] {
            m.record_received();
            m.record_sent(status, Duration::from_micros(250));
        }

        let snap = m.snapshot();
        assert_eq!(snap.total_requests_received, 4);
        assert_eq!(snap.total_responses_sent, 4);
        assert_eq!(snap.total_processing_time_microseconds, 1000);
        assert_eq!(snap.total_responses_sent_by_status["200"], 2);
        assert_eq!(snap.total_responses_sent_by_status["404"], 1);
        assert_eq!(snap.total_responses_sent_by_status.values().sum::<u64>(), 4);
        assert_eq!(m.responses_with_status(429), 1);
        assert_eq!(m.responses_with_status(500), 0);
    }
}
