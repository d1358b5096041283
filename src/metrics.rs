/// Metrics and telemetry for HerdWatch
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Upload outcomes
/// - Classifier call latency and failures
/// - Dashboard statistics requests

use crate::error::{HerdError, HerdResult};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Pipeline Metrics ==========

    /// Uploads by outcome
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "herdwatch_uploads_total",
        "Total number of image uploads by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Classifier call duration in seconds
    pub static ref CLASSIFIER_DURATION_SECONDS: Histogram = register_histogram!(
        "herdwatch_classifier_duration_seconds",
        "Classifier call latencies in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    /// Classifier failures by kind
    pub static ref CLASSIFIER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "herdwatch_classifier_failures_total",
        "Total number of failed classifier calls",
        &["kind"]
    )
    .unwrap();

    /// Dashboard statistics computations by result
    pub static ref STATS_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "herdwatch_stats_requests_total",
        "Total number of dashboard statistics computations",
        &["result"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> HerdResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| HerdError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| HerdError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record how an upload ended
pub fn record_upload(outcome: &str) {
    UPLOADS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a classifier call
pub fn record_classifier_call(duration: f64, failure_kind: Option<&str>) {
    CLASSIFIER_DURATION_SECONDS.observe(duration);
    if let Some(kind) = failure_kind {
        CLASSIFIER_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }
}

/// Record a dashboard statistics computation
pub fn record_stats_request(success: bool) {
    STATS_REQUESTS_TOTAL
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}
