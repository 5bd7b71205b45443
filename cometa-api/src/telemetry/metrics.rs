//! Prometheus Metrics Definitions
//!
//! Defines all COMETA metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use cometa_core::{QueryTier, TierFailure};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Query tier latency buckets (seconds)
const QUERY_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<CometaMetrics>> = Lazy::new(CometaMetrics::new);

/// Container for all COMETA metrics.
#[derive(Clone)]
pub struct CometaMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Query tier attempts - labels: tier, outcome (success/failure)
    pub query_tier_attempts_total: CounterVec,

    /// Duration of successful tier queries - labels: tier
    pub query_tier_duration_seconds: HistogramVec,

    /// Projects cache lookups - labels: result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Tag invalidations - labels: tag
    pub cache_invalidations_total: CounterVec,
}

impl CometaMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "cometa_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "cometa_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            query_tier_attempts_total: register_counter_vec!(
                "cometa_query_tier_attempts_total",
                "Projects query attempts per tier",
                &["tier", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register query_tier_attempts_total: {}", e)))?,

            query_tier_duration_seconds: register_histogram_vec!(
                "cometa_query_tier_duration_seconds",
                "Duration of the successful projects query tier in seconds",
                &["tier"],
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register query_tier_duration_seconds: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "cometa_cache_lookups_total",
                "Projects cache lookups",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            cache_invalidations_total: register_counter_vec!(
                "cometa_cache_invalidations_total",
                "Cache tag invalidations",
                &["tag"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_invalidations_total: {}", e)))?,
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

    /// Record a successful tier and the failures that preceded it.
    pub fn record_query(&self, tier: QueryTier, duration_ms: f64, failures: &[TierFailure]) {
        self.record_tier_failures(failures);
        self.query_tier_attempts_total
            .with_label_values(&[tier.as_str(), "success"])
            .inc();
        self.query_tier_duration_seconds
            .with_label_values(&[tier.as_str()])
            .observe(duration_ms / 1000.0);
    }

    /// Record failed tier attempts.
    pub fn record_tier_failures(&self, failures: &[TierFailure]) {
        for failure in failures {
            self.query_tier_attempts_total
                .with_label_values(&[failure.tier.as_str(), "failure"])
                .inc();
        }
    }

    /// Record a projects cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    /// Record a tag invalidation.
    pub fn record_invalidation(&self, tag: &str) {
        self.cache_invalidations_total.with_label_values(&[tag]).inc();
    }
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&CometaMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
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
