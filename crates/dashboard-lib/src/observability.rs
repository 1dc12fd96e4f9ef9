//! Observability infrastructure for the dashboard
//!
//! Provides:
//! - Prometheus metrics (collection latency, per-kind fetch latency, cache hits and misses)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Histogram, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for cluster round-trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DashboardMetricsInner> = OnceLock::new();

struct DashboardMetricsInner {
    collection_latency_seconds: Histogram,
    collections: IntCounter,
    collection_failures: IntCounterVec,
    fetch_latency_seconds: HistogramVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
}

impl DashboardMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "dashboard_collection_latency_seconds",
                "Time spent collecting all requested resource kinds",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            collections: register_int_counter!(
                "dashboard_collections_total",
                "Total number of collections started"
            )
            .expect("Failed to register collections_total"),

            collection_failures: register_int_counter_vec!(
                "dashboard_collection_failures_total",
                "Total number of failed collections by reason",
                &["reason"]
            )
            .expect("Failed to register collection_failures_total"),

            fetch_latency_seconds: register_histogram_vec!(
                "dashboard_fetch_latency_seconds",
                "Time spent listing one resource kind across its namespaces",
                &["kind"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            cache_hits: register_int_counter_vec!(
                "dashboard_cache_hits_total",
                "Cache lookups served from a fresh entry",
                &["cache"]
            )
            .expect("Failed to register cache_hits_total"),

            cache_misses: register_int_counter_vec!(
                "dashboard_cache_misses_total",
                "Cache lookups that fell through to the cluster",
                &["cache"]
            )
            .expect("Failed to register cache_misses_total"),
        }
    }
}

/// Dashboard metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct DashboardMetrics {
    _private: (),
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DashboardMetricsInner {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new)
    }

    pub fn inc_collections(&self) {
        self.inner().collections.inc();
    }

    pub fn observe_collection_latency(&self, elapsed: Duration) {
        self.inner()
            .collection_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_collection_failures(&self, reason: &str) {
        self.inner()
            .collection_failures
            .with_label_values(&[reason])
            .inc();
    }

    pub fn observe_fetch_latency(&self, kind: &str, elapsed: Duration) {
        self.inner()
            .fetch_latency_seconds
            .with_label_values(&[kind])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_cache_lookup(&self, cache: &str, hit: bool) {
        let counter = if hit {
            &self.inner().cache_hits
        } else {
            &self.inner().cache_misses
        };
        counter.with_label_values(&[cache]).inc();
    }
}

/// Structured logger for dashboard events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16, resources_cache: bool) {
        info!(
            event = "dashboard_started",
            instance = %self.instance,
            version = %version,
            port = port,
            resources_cache = resources_cache,
            "Dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Dashboard shutting down"
        );
    }

    pub fn log_collection(&self, kinds: usize, namespaces: usize, elapsed: Duration) {
        info!(
            event = "collection_completed",
            instance = %self.instance,
            kinds = kinds,
            namespaces = namespaces,
            elapsed_ms = elapsed.as_millis() as u64,
            "Collected cluster data"
        );
    }

    pub fn log_collection_failed(&self, reason: &str, error: &dyn std::error::Error) {
        warn!(
            event = "collection_failed",
            instance = %self.instance,
            reason = %reason,
            error = %error,
            "Failed to collect cluster data"
        );
    }
}
