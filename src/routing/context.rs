//! Routing inputs and outputs.
//!
//! `RoutingContext` is built once per request from the detection results
//! plus caller-supplied metadata and never mutated afterwards. The decision
//! types are small enums so match exhaustiveness is compiler-checked.

use crate::detect::DetectionResult;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Explicit caller preference that overrides the confidence ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeHint {
    /// Caller wants the cheapest answer now; forces the static path.
    Fast,
    /// Caller wants depth; forces at least the hybrid path even when
    /// confidence alone would justify a static answer.
    Comprehensive,
}

/// Response strategy chosen by the decision ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Serve the canned explanation only.
    Static,
    /// Serve a generated response only.
    Dynamic,
    /// Serve the canned explanation, enriched by a best-effort generation.
    Hybrid,
}

impl RouteDecision {
    /// Whether this decision is the static path.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static)
    }

    /// Whether this decision requires a downstream generation call.
    pub fn needs_generation(&self) -> bool {
        matches!(self, Self::Dynamic | Self::Hybrid)
    }
}

/// Which path actually served the response, for telemetry.
///
/// Differs from [`RouteDecision`] in one way: a cache hit short-circuits
/// the decision entirely and is reported as its own route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// Canned explanation.
    Static,
    /// Generated response.
    Dynamic,
    /// Canned plus generated.
    Hybrid,
    /// Previously generated response served from the cache.
    CacheHit,
}

impl RouteType {
    /// Label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Hybrid => "hybrid",
            Self::CacheHit => "cache_hit",
        }
    }
}

/// Rough latency expectation attached to a decision, for caller display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Sub-millisecond: cache hit or canned text.
    Instant,
    /// Canned text plus local work.
    Fast,
    /// A downstream generation call is on the critical path.
    Slow,
}

/// Immutable per-request input to the router.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The analyzed text.
    pub query: String,
    /// Detection results, in library order.
    pub detections: Vec<DetectionResult>,
    /// Caller-declared intent, if any (part of the cache fingerprint).
    pub intent: Option<String>,
    /// Rough complexity of the request in `[0, 1]`.
    pub complexity: f64,
    /// Whether rich external context (files, session history) is available
    /// to make a generated answer worth the wait.
    pub rich_context: bool,
    /// Explicit caller preference, if any.
    pub mode_hint: Option<ModeHint>,
    /// Digest of the relevant caller context, folded into the fingerprint.
    pub context_digest: u64,
}

impl RoutingContext {
    /// Build a context from detection output with neutral metadata.
    pub fn new(query: impl Into<String>, detections: Vec<DetectionResult>) -> Self {
        Self {
            query: query.into(),
            detections,
            intent: None,
            complexity: 0.0,
            rich_context: false,
            mode_hint: None,
            context_digest: 0,
        }
    }

    /// Set the caller intent.
    #[must_use]
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Set the complexity score, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity.clamp(0.0, 1.0);
        self
    }

    /// Mark rich external context as available.
    #[must_use]
    pub fn with_rich_context(mut self, available: bool) -> Self {
        self.rich_context = available;
        self
    }

    /// Set an explicit mode hint.
    #[must_use]
    pub fn with_mode_hint(mut self, hint: ModeHint) -> Self {
        self.mode_hint = Some(hint);
        self
    }

    /// Fold a digest of the relevant caller context into the fingerprint.
    #[must_use]
    pub fn with_context_digest(mut self, digest: u64) -> Self {
        self.context_digest = digest;
        self
    }

    /// Highest per-pattern confidence, 0.0 when nothing was evaluated.
    pub fn max_confidence(&self) -> f64 {
        self.detections
            .iter()
            .map(|d| d.confidence)
            .fold(0.0, f64::max)
    }

    /// The strongest detection, if any pattern crossed its threshold.
    pub fn top_detection(&self) -> Option<&DetectionResult> {
        self.detections
            .iter()
            .filter(|d| d.detected)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Stable cache fingerprint for this logical request.
    ///
    /// Derived from the whitespace-normalized lowercase query, the intent,
    /// and the caller-context digest. Identical logical requests produce
    /// identical fingerprints.
    pub fn fingerprint(&self) -> String {
        let normalized = self
            .query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        self.intent.hash(&mut hasher);
        self.context_digest.hash(&mut hasher);
        format!("fp:{:016x}", hasher.finish())
    }
}

/// Output of the pure decision function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResult {
    /// The chosen strategy.
    pub decision: RouteDecision,
    /// Max confidence the decision was based on.
    pub confidence: f64,
    /// Why this strategy was chosen, for logs and caller display.
    pub reasoning: String,
    /// Expected latency of this strategy.
    pub latency_class: LatencyClass,
}
