//! # Stage: Advisor Service
//!
//! ## Responsibility
//! The inbound boundary: `analyze(text, context)` wires the detection
//! engine, the router, and the shared reliability services into one call
//! and renders the result the caller formats into a reply.
//!
//! ## Guarantees
//! - Construction fails only on invalid configuration or pattern library;
//!   a built service never returns an error per request.
//! - Every analysis produces an answer, possibly degraded to static.
//!
//! ## NOT Responsible For
//! - Transport (HTTP, CLI) and reply formatting
//! - Fetching the text being analyzed

use crate::config::AdvisorConfig;
use crate::detect::{DetectionEngine, DetectionResult, Detector, PatternLibrary, RegexCache};
use crate::generate::Generator;
use crate::resilience::{CircuitBreaker, ResponseCache};
use crate::routing::{HybridRouter, ModeHint, RouteType, RoutingContext};
use crate::telemetry::{TelemetryCollector, TelemetrySummary};
use crate::AdvisorError;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;

/// Caller-supplied metadata accompanying one analysis request.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    /// Declared intent, e.g. "review" or "triage".
    pub intent: Option<String>,
    /// Files relevant to the request; their presence marks the context
    /// as rich enough to justify a generated answer.
    pub file_paths: Vec<String>,
    /// Prior session identifier, if the caller is continuing one.
    pub session_id: Option<String>,
    /// Explicit response-mode preference.
    pub mode_hint: Option<ModeHint>,
}

impl CallerContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the declared intent.
    #[must_use]
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Attach relevant file paths.
    #[must_use]
    pub fn with_file_paths(mut self, paths: Vec<String>) -> Self {
        self.file_paths = paths;
        self
    }

    /// Attach a prior session identifier.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Set an explicit mode hint.
    #[must_use]
    pub fn with_mode_hint(mut self, hint: ModeHint) -> Self {
        self.mode_hint = Some(hint);
        self
    }

    /// Whether enough external context exists for a generated answer to be
    /// worth the wait.
    fn is_rich(&self) -> bool {
        !self.file_paths.is_empty() || self.session_id.is_some()
    }

    /// Stable digest of the cache-relevant parts of this context.
    fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.file_paths.hash(&mut hasher);
        self.session_id.hash(&mut hasher);
        hasher.finish()
    }
}

/// What one analysis produced, with enough metadata for the caller to
/// format a user-facing reply.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// The rendered advisory text.
    pub content: String,
    /// The path that served it.
    pub route_type: RouteType,
    /// Highest per-pattern confidence observed.
    pub confidence: f64,
    /// Evidence labels of the strongest detection, if any crossed its
    /// threshold.
    pub evidence: Vec<String>,
    /// Full per-pattern results, in library order.
    pub detections: Vec<DetectionResult>,
    /// Why the router chose this path.
    pub reasoning: String,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
}

/// The assembled pipeline behind the `analyze` boundary.
pub struct AdvisorService {
    library: PatternLibrary,
    detector: Arc<dyn Detector>,
    router: HybridRouter,
    breaker: Arc<CircuitBreaker>,
    telemetry: Arc<TelemetryCollector>,
    cache: Arc<ResponseCache>,
}

impl AdvisorService {
    /// Assemble the pipeline from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::Config`] if the pattern library fails
    /// validation or a regex does not compile. This is the only fatal
    /// error surface; a constructed service answers every request.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn new(
        config: &AdvisorConfig,
        library: PatternLibrary,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, AdvisorError> {
        let regex_cache = RegexCache::new(config.detection.regex_cache_size);
        let engine = DetectionEngine::new(library.clone(), &regex_cache)?;

        let cache = Arc::new(ResponseCache::new(config.cache.max_entries));
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker.failure_threshold,
            config.breaker.success_threshold,
            config.breaker.recovery_timeout(),
        ));
        let telemetry = Arc::new(TelemetryCollector::new(config.telemetry.window_size));

        let router = HybridRouter::new(
            config.routing.clone(),
            generator,
            Arc::clone(&cache),
            Arc::clone(&breaker),
            Arc::clone(&telemetry),
        );

        info!(
            patterns = library.patterns.len(),
            static_threshold = config.routing.static_threshold,
            "advisor service assembled"
        );

        Ok(Self {
            library,
            detector: Arc::new(engine),
            router,
            breaker,
            telemetry,
            cache,
        })
    }

    /// Analyze one text and produce an advisory response.
    ///
    /// Never fails: any downstream problem degrades to a static response.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn analyze(&self, text: &str, context: &CallerContext) -> AnalysisResult {
        let detections = self.detector.detect(text, None);

        let mut ctx = RoutingContext::new(text, detections)
            .with_complexity(complexity_of(text))
            .with_rich_context(context.is_rich())
            .with_context_digest(context.digest());
        if let Some(intent) = &context.intent {
            ctx = ctx.with_intent(intent.clone());
        }
        if let Some(hint) = context.mode_hint {
            ctx = ctx.with_mode_hint(hint);
        }

        let (static_content, evidence) = self.static_content_for(&ctx);
        let prompt = self.prompt_for(&ctx);

        let response = self.router.respond(&ctx, &static_content, &prompt).await;

        AnalysisResult {
            content: response.content,
            route_type: response.route_type,
            confidence: response.routing.confidence,
            evidence,
            detections: ctx.detections,
            reasoning: response.routing.reasoning,
            latency_ms: response.latency_ms,
        }
    }

    /// Current pipeline summary for the observability surface.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn summary(&self) -> TelemetrySummary {
        self.telemetry.summary(self.breaker.state())
    }

    /// Handle to the shared circuit breaker (operator reset/trip).
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Handle to the response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// The canned body for the static path, plus the evidence labels of
    /// the detection that produced it.
    fn static_content_for(&self, ctx: &RoutingContext) -> (String, Vec<String>) {
        match ctx.top_detection() {
            Some(top) => {
                let advice = self
                    .library
                    .find(&top.pattern_id)
                    .map(|p| p.advice.clone())
                    .unwrap_or_else(|| "A known anti-pattern was detected.".to_string());
                (
                    format!(
                        "Detected '{}' (confidence {:.2}).\n\n{}",
                        top.pattern_id, top.confidence, advice
                    ),
                    top.evidence.clone(),
                )
            }
            None => (
                "No known anti-pattern detected in this text. Proceeding looks \
                 reasonable from a pattern-analysis standpoint."
                    .to_string(),
                Vec::new(),
            ),
        }
    }

    /// The prompt sent down the dynamic path.
    fn prompt_for(&self, ctx: &RoutingContext) -> String {
        let mut prompt = format!("Analyze the following request:\n\n{}\n", ctx.query);
        let detected: Vec<&DetectionResult> =
            ctx.detections.iter().filter(|d| d.detected).collect();
        if !detected.is_empty() {
            prompt.push_str("\nSignals already detected:\n");
            for d in detected {
                prompt.push_str(&format!(
                    "- {} (confidence {:.2}, evidence: {})\n",
                    d.pattern_id,
                    d.confidence,
                    d.evidence.join(", ")
                ));
            }
        }
        prompt.push_str("\nExplain the risks and suggest a better approach.");
        prompt
    }
}

/// Rough complexity heuristic: longer requests warrant deeper answers.
fn complexity_of(text: &str) -> f64 {
    (text.split_whitespace().count() as f64 / 200.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::EchoGenerator;
    use crate::resilience::CircuitState;

    fn service() -> AdvisorService {
        AdvisorService::new(
            &AdvisorConfig::default(),
            PatternLibrary::builtin(),
            Arc::new(EchoGenerator::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_confident_detection_serves_static_advice() {
        let service = service();
        let result = service
            .analyze(
                "We're planning to build a custom HTTP client instead of using their SDK",
                &CallerContext::new(),
            )
            .await;
        assert_eq!(result.route_type, RouteType::Static);
        assert!(result.confidence >= 0.7);
        assert!(result.content.contains("reinventing-the-sdk"));
        assert!(result.evidence.contains(&"custom implementation".to_string()));
    }

    #[tokio::test]
    async fn test_unmatched_text_gets_an_answer() {
        let service = service();
        let result = service
            .analyze("what time is the standup?", &CallerContext::new())
            .await;
        assert!(!result.content.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert!(result.evidence.is_empty());
    }

    #[tokio::test]
    async fn test_rich_context_low_confidence_goes_dynamic() {
        let service = service();
        let ctx = CallerContext::new()
            .with_file_paths(vec!["src/client.rs".to_string()])
            .with_intent("review");
        let result = service
            .analyze("thinking about building something custom here", &ctx)
            .await;
        assert_eq!(result.route_type, RouteType::Dynamic);
    }

    #[tokio::test]
    async fn test_fast_hint_skips_generation() {
        let service = service();
        let ctx = CallerContext::new()
            .with_file_paths(vec!["a.rs".to_string()])
            .with_mode_hint(ModeHint::Fast);
        let result = service
            .analyze("low signal text with files attached", &ctx)
            .await;
        assert_eq!(result.route_type, RouteType::Static);
    }

    #[tokio::test]
    async fn test_repeat_analysis_hits_cache() {
        let service = service();
        let ctx = CallerContext::new().with_file_paths(vec!["a.rs".to_string()]);
        let first = service.analyze("explain this design decision", &ctx).await;
        assert_eq!(first.route_type, RouteType::Dynamic);

        let second = service.analyze("explain this design decision", &ctx).await;
        assert_eq!(second.route_type, RouteType::CacheHit);
        assert_eq!(second.content, first.content);
    }

    #[tokio::test]
    async fn test_summary_reflects_served_traffic() {
        let service = service();
        let _ = service
            .analyze("custom http client instead of the sdk", &CallerContext::new())
            .await;
        let summary = service.summary();
        assert_eq!(summary.total_responses, 1);
        assert_eq!(summary.circuit_state, CircuitState::Closed);
    }

    #[test]
    fn test_invalid_library_fails_construction() {
        let mut library = PatternLibrary::builtin();
        library.patterns[0].threshold = 9.0;
        let result = AdvisorService::new(
            &AdvisorConfig::default(),
            library,
            Arc::new(EchoGenerator::new()),
        );
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_complexity_heuristic_clamps() {
        assert_eq!(complexity_of(""), 0.0);
        let long = "word ".repeat(500);
        assert_eq!(complexity_of(&long), 1.0);
    }
}
