//! Request statistics and the request-logging middleware

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters for every response served since startup
#[derive(Debug)]
pub struct RequestStats {
    started: Instant,
    started_at: DateTime<Utc>,
    total_count: AtomicU64,
    total_response_micros: AtomicU64,
    status_counts: DashMap<u16, u64>,
}

/// Point-in-time view of [`RequestStats`]
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub uptime_sec: f64,
    pub total_count: u64,
    pub total_status_code_count: BTreeMap<u16, u64>,
    pub total_response_time_sec: f64,
    pub average_response_time_sec: f64,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            total_count: AtomicU64::new(0),
            total_response_micros: AtomicU64::new(0),
            status_counts: DashMap::new(),
        }
    }

    pub fn record(&self, status: u16, elapsed: Duration) {
        self.total_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        *self.status_counts.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total_count = self.total_count.load(Ordering::Relaxed);
        let total = Duration::from_micros(self.total_response_micros.load(Ordering::Relaxed));
        let average = if total_count == 0 {
            Duration::ZERO
        } else {
            total.div_f64(total_count as f64)
        };

        StatsSnapshot {
            pid: std::process::id(),
            started_at: self.started_at,
            uptime_sec: self.started.elapsed().as_secs_f64(),
            total_count,
            total_status_code_count: self
                .status_counts
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            total_response_time_sec: total.as_secs_f64(),
            average_response_time_sec: average.as_secs_f64(),
        }
    }
}

/// Record and log every request passing through the router
pub async fn track_requests(
    State(stats): State<Arc<RequestStats>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    stats.record(status, elapsed);
    info!(
        method = %method,
        path = %path,
        status = status,
        elapsed_ms = elapsed.as_millis() as u64,
        "Handled request"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let snapshot = RequestStats::new().snapshot();

        assert_eq!(snapshot.pid, std::process::id());
        assert_eq!(snapshot.total_count, 0);
        assert!(snapshot.total_status_code_count.is_empty());
        assert_eq!(snapshot.average_response_time_sec, 0.0);
    }

    #[test]
    fn test_counts_by_status() {
        let stats = RequestStats::new();
        stats.record(200, Duration::from_millis(10));
        stats.record(200, Duration::from_millis(30));
        stats.record(502, Duration::from_millis(20));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.total_status_code_count[&200], 2);
        assert_eq!(snapshot.total_status_code_count[&502], 1);
        assert!((snapshot.total_response_time_sec - 0.06).abs() < 1e-6);
        assert!((snapshot.average_response_time_sec - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_serializes_status_keys() {
        let stats = RequestStats::new();
        stats.record(404, Duration::from_millis(1));

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["total_status_code_count"]["404"], 1);
    }
}
