//! Prometheus Metrics Definitions
//!
//! Defines the HERD metrics with their labels and types, and exposes a
//! /metrics endpoint for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herd_core::CacheStats;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::ResponseCacheState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<HerdMetrics>> = Lazy::new(HerdMetrics::new);

/// Outcome of a cache consultation, used as the `result` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Expired,
    /// The request skipped the cache (no-cache directive).
    Bypass,
}

impl LookupOutcome {
    fn as_label(self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Expired => "expired",
            LookupOutcome::Bypass => "bypass",
        }
    }
}

/// How a request took part in coalescing, used as the `role` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceOutcome {
    Leader,
    Follower,
    /// A follower whose leader failed it, running the handler itself.
    Fallback,
}

impl CoalesceOutcome {
    fn as_label(self) -> &'static str {
        match self {
            CoalesceOutcome::Leader => "leader",
            CoalesceOutcome::Follower => "follower",
            CoalesceOutcome::Fallback => "fallback",
        }
    }
}

/// Container for all HERD metrics.
#[derive(Clone)]
pub struct HerdMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: IntCounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache consultations - labels: result
    pub cache_lookups_total: IntCounterVec,

    /// Coalescing participation - labels: role
    pub coalesce_total: IntCounterVec,

    /// Entries removed by path invalidation
    pub cache_invalidations_total: IntCounter,

    /// Entries removed by GC sweeps
    pub cache_gc_evictions_total: IntCounter,

    /// Entries currently cached
    pub cache_entries: IntGauge,
}

impl HerdMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_int_counter_vec!(
                "herd_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "herd_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_lookups_total: register_int_counter_vec!(
                "herd_cache_lookups_total",
                "Response cache lookups by result",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            coalesce_total: register_int_counter_vec!(
                "herd_coalesce_total",
                "Requests handled by the coalescing queue, by role",
                &["role"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register coalesce_total: {}", e)))?,

            cache_invalidations_total: register_int_counter!(
                "herd_cache_invalidations_total",
                "Cache entries removed by path invalidation"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_invalidations_total: {}", e)))?,

            cache_gc_evictions_total: register_int_counter!(
                "herd_cache_gc_evictions_total",
                "Cache entries removed by GC sweeps"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_gc_evictions_total: {}", e)))?,

            cache_entries: register_int_gauge!(
                "herd_cache_entries",
                "Entries currently held by the response cache"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_entries: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_lookup(&self, outcome: LookupOutcome) {
        self.cache_lookups_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    pub fn record_coalesce(&self, outcome: CoalesceOutcome) {
        self.coalesce_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    pub fn record_invalidation(&self, removed: usize) {
        self.cache_invalidations_total.inc_by(removed as u64);
    }

    /// Bring the cache gauges up to date with a stats snapshot.
    ///
    /// GC runs on the blocking pool without access to the registry, so its
    /// evictions are folded in here at scrape time.
    pub fn sync_cache_stats(&self, stats: &CacheStats) {
        self.cache_entries
            .set(i64::try_from(stats.entries).unwrap_or(i64::MAX));

        let seen = self.cache_gc_evictions_total.get();
        if stats.gc_evicted > seen {
            self.cache_gc_evictions_total.inc_by(stats.gc_evicted - seen);
        }
    }
}

/// Metrics handle, or `None` if registration failed at startup.
pub fn metrics() -> Option<&'static HerdMetrics> {
    METRICS.as_ref().ok()
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(cache): State<ResponseCacheState>) -> impl IntoResponse {
    if let Some(metrics) = metrics() {
        metrics.sync_cache_stats(&cache.cache().stats());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn registered() -> Result<&'static HerdMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = registered()?;
        assert!(!metrics.cache_lookups_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_lookup_and_coalesce() -> Result<(), String> {
        let metrics = registered()?;
        let before = metrics.cache_lookups_total.with_label_values(&["hit"]).get();
        metrics.record_lookup(LookupOutcome::Hit);
        assert!(metrics.cache_lookups_total.with_label_values(&["hit"]).get() > before);

        metrics.record_coalesce(CoalesceOutcome::Follower);
        assert!(metrics.coalesce_total.with_label_values(&["follower"]).get() >= 1);
        Ok(())
    }

    #[test]
    fn test_sync_cache_stats_is_monotonic() -> Result<(), String> {
        let metrics = registered()?;
        let base = metrics.cache_gc_evictions_total.get();
        let stats = CacheStats {
            entries: 3,
            gc_evicted: base + 4,
            ..Default::default()
        };
        metrics.sync_cache_stats(&stats);
        assert_eq!(metrics.cache_gc_evictions_total.get(), base + 4);

        // An older snapshot never moves the counter backwards.
        metrics.sync_cache_stats(&CacheStats::default());
        assert_eq!(metrics.cache_gc_evictions_total.get(), base + 4);
        Ok(())
    }
}
