//! # Stage: Observability Endpoint
//!
//! ## Responsibility
//! Serve the read-only operator surface over HTTP: Prometheus scrape text,
//! a liveness probe, and the JSON telemetry summary.
//!
//! ## Guarantees
//! - Read-only: no endpoint mutates pipeline state.
//! - Available only with the `metrics-server` feature enabled.
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /health` - liveness probe
//! - `GET /summary` - [`TelemetrySummary`](crate::telemetry::TelemetrySummary) as JSON

use crate::metrics;
use crate::service::AdvisorService;
use crate::AdvisorError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the observability router over a shared service handle.
pub fn app(service: Arc<AdvisorService>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/summary", get(summary_handler))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the observability endpoint until the process exits.
///
/// # Errors
///
/// Returns [`AdvisorError::Other`] if the address cannot be bound or the
/// server fails while running.
///
/// # Panics
///
/// This function never panics.
pub async fn serve(service: Arc<AdvisorService>, addr: &str) -> Result<(), AdvisorError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AdvisorError::Other(format!("cannot bind {addr}: {e}")))?;
    info!(addr, "observability endpoint listening");

    axum::serve(listener, app(service))
        .await
        .map_err(|e| AdvisorError::Other(format!("observability server failed: {e}")))
}

async fn metrics_handler() -> impl IntoResponse {
    let Some(m) = metrics::metrics() else {
        return (StatusCode::OK, String::new());
    };
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&m.registry().gather(), &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encode error: {e}"),
        );
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn summary_handler(State(service): State<Arc<AdvisorService>>) -> impl IntoResponse {
    Json(service.summary())
}
