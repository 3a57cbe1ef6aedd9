//! The hybrid router: pure decision ladder plus path orchestration.
//!
//! `decide` is a pure function of the context and one observed breaker
//! state. `respond` wraps it with the side-effecting pipeline: cache
//! lookup, breaker acquisition, the timed generation call, cache write,
//! telemetry, and the static fallback that absorbs every failure.

use crate::generate::{GenerateError, Generator};
use crate::metrics;
use crate::resilience::{CircuitBreaker, CircuitState, ResponseCache};
use crate::routing::config::RouterConfig;
use crate::routing::context::{
    LatencyClass, ModeHint, RouteDecision, RouteType, RoutingContext, RoutingResult,
};
use crate::telemetry::{ResponseMetric, TelemetryCollector};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the router actually served for one request.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    /// The rendered response body.
    pub content: String,
    /// The path that produced the body. Differs from `routing.decision`
    /// on cache hits and fallbacks.
    pub route_type: RouteType,
    /// The decision the ladder made, with reasoning.
    pub routing: RoutingResult,
    /// End-to-end latency of this request in milliseconds.
    pub latency_ms: u64,
}

/// Confidence-based router over the static, dynamic, and hybrid paths.
///
/// Holds handles to the shared reliability services; constructed once at
/// startup and shared across request tasks via `Arc`.
pub struct HybridRouter {
    config: RouterConfig,
    generator: Arc<dyn Generator>,
    cache: Arc<ResponseCache>,
    breaker: Arc<CircuitBreaker>,
    telemetry: Arc<TelemetryCollector>,
}

impl HybridRouter {
    /// Create a router over explicitly constructed services.
    pub fn new(
        config: RouterConfig,
        generator: Arc<dyn Generator>,
        cache: Arc<ResponseCache>,
        breaker: Arc<CircuitBreaker>,
        telemetry: Arc<TelemetryCollector>,
    ) -> Self {
        Self {
            config,
            generator,
            cache,
            breaker,
            telemetry,
        }
    }

    /// The router's configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Pure decision ladder. Deterministic for a fixed context and a fixed
    /// observed breaker state.
    ///
    /// Evaluated in order:
    /// 1. Breaker open: static, the dynamic path is unavailable.
    /// 2. Explicit mode hint: `Fast` forces static, `Comprehensive`
    ///    forces at least hybrid even at high confidence.
    /// 3. Max confidence at or above the static threshold: static.
    /// 4. Rich external context available: dynamic.
    /// 5. Otherwise: hybrid. Ties go to the cheaper option.
    pub fn decide(&self, ctx: &RoutingContext, breaker_state: CircuitState) -> RoutingResult {
        let confidence = ctx.max_confidence();

        if breaker_state == CircuitState::Open {
            return RoutingResult {
                decision: RouteDecision::Static,
                confidence,
                reasoning: "circuit breaker open, dynamic path unavailable".to_string(),
                latency_class: LatencyClass::Fast,
            };
        }

        match ctx.mode_hint {
            Some(ModeHint::Fast) => {
                return RoutingResult {
                    decision: RouteDecision::Static,
                    confidence,
                    reasoning: "explicit fast mode requested".to_string(),
                    latency_class: LatencyClass::Fast,
                };
            }
            Some(ModeHint::Comprehensive) => {
                let (decision, reasoning) = if ctx.rich_context {
                    (
                        RouteDecision::Dynamic,
                        "comprehensive mode with rich context available",
                    )
                } else {
                    (
                        RouteDecision::Hybrid,
                        "comprehensive mode requested, no rich context",
                    )
                };
                return RoutingResult {
                    decision,
                    confidence,
                    reasoning: reasoning.to_string(),
                    latency_class: LatencyClass::Slow,
                };
            }
            None => {}
        }

        if confidence >= self.config.static_threshold {
            RoutingResult {
                decision: RouteDecision::Static,
                confidence,
                reasoning: format!(
                    "confidence {:.2} at or above static threshold {:.2}",
                    confidence, self.config.static_threshold
                ),
                latency_class: LatencyClass::Fast,
            }
        } else if ctx.rich_context {
            RoutingResult {
                decision: RouteDecision::Dynamic,
                confidence,
                reasoning: format!(
                    "confidence {:.2} below threshold, rich context available",
                    confidence
                ),
                latency_class: LatencyClass::Slow,
            }
        } else {
            RoutingResult {
                decision: RouteDecision::Hybrid,
                confidence,
                reasoning: format!(
                    "confidence {:.2} below threshold, serving static with best-effort enrichment",
                    confidence
                ),
                latency_class: LatencyClass::Slow,
            }
        }
    }

    /// Serve one request: decide, orchestrate, and always return a
    /// response.
    ///
    /// `static_content` is the canned explanation to serve on the static
    /// path and on every fallback; `prompt` is what the generator is asked
    /// when the dynamic path is taken. No error escapes this method.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn respond(
        &self,
        ctx: &RoutingContext,
        static_content: &str,
        prompt: &str,
    ) -> RoutedResponse {
        let start = Instant::now();
        let fingerprint = ctx.fingerprint();

        // Cache short-circuit: a hit skips the ladder and the downstream
        // entirely.
        if let Some(cached) = self.cache.get(&fingerprint) {
            metrics::record_cache_lookup(true);
            let routing = RoutingResult {
                decision: RouteDecision::Static,
                confidence: ctx.max_confidence(),
                reasoning: "cache hit for an identical logical request".to_string(),
                latency_class: LatencyClass::Instant,
            };
            return self.finish(RouteType::CacheHit, cached, routing, start, true, None);
        }
        metrics::record_cache_lookup(false);

        let breaker_state = self.breaker.effective_state();
        let routing = self.decide(ctx, breaker_state);

        if breaker_state == CircuitState::Open {
            // Count the requests the open breaker actually turned away,
            // not confident-static traffic that never needed generation.
            let would = self.decide(ctx, CircuitState::Closed);
            if would.decision.needs_generation() {
                metrics::record_circuit_rejection();
                info!(
                    fingerprint = %fingerprint,
                    "generation rejected by open breaker, serving static"
                );
            }
        }

        if !routing.decision.needs_generation() {
            return self.finish(
                RouteType::Static,
                static_content.to_string(),
                routing,
                start,
                true,
                None,
            );
        }

        // Generation path, guarded by the breaker. The acquire is the
        // authoritative gate: it performs the half-open transition and
        // closes the race between the state read above and this call.
        if self.breaker.try_acquire().is_err() {
            metrics::record_circuit_rejection();
            warn!(fingerprint = %fingerprint, "breaker rejected acquire, serving static");
            let routing = RoutingResult {
                reasoning: "circuit breaker open, dynamic path unavailable".to_string(),
                decision: RouteDecision::Static,
                ..routing
            };
            return self.finish(
                RouteType::Static,
                static_content.to_string(),
                routing,
                start,
                true,
                None,
            );
        }

        let deadline = self.config.generation_timeout();
        let generator = Arc::clone(&self.generator);
        let prompt_owned = prompt.to_string();
        let mut handle =
            tokio::spawn(async move { generator.generate(&prompt_owned, deadline).await });

        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(Ok(generated))) => {
                self.breaker.record_success();
                self.cache
                    .insert(&fingerprint, &generated, self.config.cache_ttl_secs);

                let (route, content) = match routing.decision {
                    RouteDecision::Dynamic => (RouteType::Dynamic, generated),
                    _ => (
                        RouteType::Hybrid,
                        format!("{static_content}\n\n{generated}"),
                    ),
                };
                self.finish(route, content, routing, start, true, None)
            }
            Ok(Ok(Err(e))) => {
                self.breaker.record_failure();
                warn!(error = %e, "generation failed, serving static fallback");
                self.fallback(static_content, routing, start, error_kind(&e))
            }
            Ok(Err(join_err)) => {
                self.breaker.record_failure();
                warn!(error = %join_err, "generation task aborted, serving static fallback");
                self.fallback(static_content, routing, start, "task")
            }
            Err(_elapsed) => {
                self.breaker.record_failure();
                warn!(
                    timeout_secs = deadline.as_secs(),
                    "generation timed out, serving static fallback"
                );

                // The work is already in flight; let it finish off-path so
                // a late success still populates the cache for the next
                // caller with the same fingerprint.
                let cache = Arc::clone(&self.cache);
                let ttl = self.config.cache_ttl_secs;
                tokio::spawn(async move {
                    if let Ok(Ok(generated)) = handle.await {
                        debug!(fingerprint = %fingerprint, "late generation cached");
                        cache.insert(fingerprint, generated, ttl);
                    }
                });

                self.fallback(static_content, routing, start, "timeout")
            }
        }
    }

    /// Degrade to the static body after a failed generation attempt. The
    /// failure is recorded against the route that was attempted.
    fn fallback(
        &self,
        static_content: &str,
        routing: RoutingResult,
        start: Instant,
        error_kind: &str,
    ) -> RoutedResponse {
        let attempted = match routing.decision {
            RouteDecision::Dynamic => RouteType::Dynamic,
            _ => RouteType::Hybrid,
        };
        let mut response = self.finish(
            attempted,
            static_content.to_string(),
            routing,
            start,
            false,
            Some(error_kind),
        );
        // The caller sees what was actually served.
        response.route_type = RouteType::Static;
        response
    }

    /// Record telemetry and metrics for a served response.
    fn finish(
        &self,
        route: RouteType,
        content: String,
        routing: RoutingResult,
        start: Instant,
        success: bool,
        error_kind: Option<&str>,
    ) -> RoutedResponse {
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let metric = match error_kind {
            None if success => ResponseMetric::success(route, latency_ms),
            Some(kind) => ResponseMetric::failure(route, latency_ms, kind),
            None => ResponseMetric::failure(route, latency_ms, "unknown"),
        };
        self.telemetry.record(metric);
        metrics::record_response(route, success);
        metrics::observe_latency(route, start.elapsed().as_secs_f64());
        metrics::set_circuit_state(self.breaker.state());

        debug!(
            route = route.as_str(),
            decision = ?routing.decision,
            success,
            latency_ms,
            "request served"
        );

        RoutedResponse {
            content,
            route_type: route,
            routing,
            latency_ms,
        }
    }
}

fn error_kind(e: &GenerateError) -> &'static str {
    match e {
        GenerateError::Transport(_) => "transport",
        GenerateError::Api { .. } => "api",
        GenerateError::Malformed(_) => "malformed",
    }
}
