//! # Stage: Metrics
//!
//! ## Responsibility
//! Export pipeline counters to Prometheus: responses by route, breaker
//! rejections and state, cache traffic, and end-to-end latency.
//!
//! ## Guarantees
//! - Recording before [`init_metrics`] is a silent no-op, never a panic.
//! - Registration happens once; repeated init calls are idempotent.
//!
//! ## NOT Responsible For
//! - The sliding-window summary (see `telemetry`)
//! - Serving the scrape endpoint (see `metrics_server`)

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, CounterVec, HistogramVec,
    IntCounter, IntGauge, Registry,
};
use std::sync::OnceLock;
use tracing::warn;

use crate::resilience::CircuitState;
use crate::routing::RouteType;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All registered collectors for the pipeline.
pub struct Metrics {
    registry: Registry,
    responses_total: CounterVec,
    response_latency_seconds: HistogramVec,
    circuit_rejections_total: IntCounter,
    circuit_state: IntGauge,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
}

impl Metrics {
    fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let responses_total = register_counter_vec_with_registry!(
            "advisor_responses_total",
            "Responses served, by route and outcome",
            &["route", "outcome"],
            registry
        )?;
        let response_latency_seconds = register_histogram_vec_with_registry!(
            "advisor_response_latency_seconds",
            "End-to-end analysis latency, by route",
            &["route"],
            vec![0.001, 0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0],
            registry
        )?;
        let circuit_rejections_total = register_int_counter_with_registry!(
            "advisor_circuit_rejections_total",
            "Calls rejected by the open circuit breaker",
            registry
        )?;
        let circuit_state = register_int_gauge_with_registry!(
            "advisor_circuit_state",
            "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            registry
        )?;
        let cache_hits_total = register_int_counter_with_registry!(
            "advisor_cache_hits_total",
            "Response cache hits",
            registry
        )?;
        let cache_misses_total = register_int_counter_with_registry!(
            "advisor_cache_misses_total",
            "Response cache misses",
            registry
        )?;

        Ok(Self {
            registry,
            responses_total,
            response_latency_seconds,
            circuit_rejections_total,
            circuit_state,
            cache_hits_total,
            cache_misses_total,
        })
    }

    /// The registry backing these collectors (for the scrape endpoint).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Install the global metrics registry. Idempotent.
///
/// # Panics
///
/// This function never panics. Registration failure is logged and leaves
/// metrics uninitialized (recording stays a no-op).
pub fn init_metrics() {
    if METRICS.get().is_some() {
        return;
    }
    match Metrics::new(Registry::new()) {
        Ok(metrics) => {
            let _ = METRICS.set(metrics);
        }
        Err(e) => warn!(error = %e, "metrics registration failed, export disabled"),
    }
}

/// The installed metrics, if [`init_metrics`] has run.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Count one served response.
pub fn record_response(route: RouteType, success: bool) {
    if let Some(m) = METRICS.get() {
        let outcome = if success { "success" } else { "failure" };
        m.responses_total
            .with_label_values(&[route.as_str(), outcome])
            .inc();
    }
}

/// Observe end-to-end latency for one served response.
pub fn observe_latency(route: RouteType, seconds: f64) {
    if let Some(m) = METRICS.get() {
        m.response_latency_seconds
            .with_label_values(&[route.as_str()])
            .observe(seconds);
    }
}

/// Count one breaker rejection (call refused while open).
pub fn record_circuit_rejection() {
    if let Some(m) = METRICS.get() {
        m.circuit_rejections_total.inc();
    }
}

/// Publish the current breaker state.
pub fn set_circuit_state(state: CircuitState) {
    if let Some(m) = METRICS.get() {
        let value = match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        };
        m.circuit_state.set(value);
    }
}

/// Count one cache lookup.
pub fn record_cache_lookup(hit: bool) {
    if let Some(m) = METRICS.get() {
        if hit {
            m.cache_hits_total.inc();
        } else {
            m.cache_misses_total.inc();
        }
    }
}
