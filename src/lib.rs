//! # pattern-advisor
//!
//! Resilient advisory analysis over free-form text (issues, PRs, chat
//! queries). Incoming text is classified against a library of known
//! anti-patterns; the result drives a hybrid router that serves either a
//! fast canned explanation or a slower, richer generated one.
//!
//! ## Architecture
//!
//! ```text
//! analyze(text, ctx) → DetectionEngine → RoutingContext → HybridRouter
//!                                             │
//!                     ResponseCache ← lookup ─┤
//!                     CircuitBreaker ← guard ─┤
//!                     Generator    ← timeout ─┤
//!                     Telemetry    ← record ──┘
//! ```
//!
//! The slow path (external generation) is treated as unreliable: every call
//! runs behind a circuit breaker and a bounded timeout, and every failure
//! degrades to a static response rather than surfacing an error.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod detect;
pub mod generate;
pub mod metrics;
pub mod resilience;
pub mod routing;
pub mod service;
pub mod telemetry;

#[cfg(feature = "metrics-server")]
pub mod metrics_server;

// Re-exports for convenience
pub use detect::{DetectionEngine, DetectionResult, Detector, PatternLibrary};
pub use generate::{EchoGenerator, Generator, HttpGenerator};
pub use resilience::{CircuitBreaker, CircuitState, ResponseCache};
pub use routing::{HybridRouter, RouteDecision, RouteType, RoutingContext};
pub use service::{AdvisorService, AnalysisResult, CallerContext};
pub use telemetry::{ResponseMetric, TelemetryCollector, TelemetrySummary};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` - structured JSON output for production log aggregators
/// - anything else (including unset) - human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`AdvisorError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), AdvisorError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| AdvisorError::Other(format!("tracing init failed: {e}")))
}

/// Top-level advisor errors.
///
/// Every error surface in the analysis pipeline maps to a variant here.
/// Only [`AdvisorError::Config`] is ever allowed to abort the process, and
/// only at startup - everything reachable from a live request is absorbed
/// into a static fallback by the router.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// A pattern definition or tuning value failed load-time validation.
    ///
    /// Fatal at startup, before any traffic is served. Never raised
    /// per-request.
    #[error("configuration error: {0}")]
    Config(String),

    /// The downstream generation call exceeded its deadline.
    ///
    /// Recovered locally via static fallback; counts as a breaker failure.
    #[error("generation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The circuit breaker is open and the call was rejected without
    /// invoking the downstream capability.
    ///
    /// Recovered locally via immediate static fallback.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The cache was unavailable or held a corrupted entry.
    ///
    /// Logged and treated as a cache miss; never fatal.
    #[error("cache error: {0}")]
    Cache(String),

    /// Any other downstream generation failure (network, API, parsing).
    ///
    /// Recovered locally via static fallback; counts as a breaker failure.
    #[error("generation failed: {0}")]
    Generate(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}
