/// Health check endpoints for liveness and readiness probes
///
/// Readiness covers the two collaborators an upload depends on:
/// - Database connectivity (required; 503 when down)
/// - Classifier availability (optional; "degraded" when down, since uploads
///   are still accepted and recorded as analysis errors)

use crate::{context::AppContext, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    /// Application version
    pub version: String,

    /// Uptime in seconds
    pub uptime_seconds: f64,

    /// Individual component checks
    pub checks: Vec<ComponentHealth>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,

    /// Status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Optional error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_endpoint))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe - answers as long as the process serves requests
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe with component details
pub async fn readiness_probe(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![check_database(&ctx).await, check_classifier(&ctx).await];
    let overall_status = determine_overall_status(&checks);

    let status_code = match overall_status {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK, // Degraded still serves uploads
    };

    if overall_status != "healthy" {
        tracing::warn!(status = overall_status, "readiness_probe_degraded");
    }

    let health = HealthStatus {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: ctx.started_at.elapsed().as_secs_f64(),
        checks,
    };

    (status_code, Json(health))
}

/// Prometheus scrape endpoint
async fn metrics_endpoint() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Check database connectivity
async fn check_database(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = ctx.records.ping().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
            details: Some(serde_json::json!({ "type": "sqlite" })),
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Check the classifier answers and has its model loaded
async fn check_classifier(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = ctx.classifier.model_info().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(info) if info.model_loaded => ComponentHealth {
            name: "classifier".to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
            details: info
                .class_names
                .map(|names| serde_json::json!({ "class_names": names })),
        },
        Ok(_) => ComponentHealth {
            name: "classifier".to_string(),
            status: "degraded".to_string(),
            response_time_ms,
            error: Some("Classifier model is not loaded".to_string()),
            details: None,
        },
        Err(e) => ComponentHealth {
            name: "classifier".to_string(),
            status: "degraded".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Worst component status wins
fn determine_overall_status(checks: &[ComponentHealth]) -> &'static str {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy"
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded"
    } else {
        "healthy"
    }
}
