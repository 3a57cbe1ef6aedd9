//! # Stage: Telemetry
//!
//! ## Responsibility
//! Record the outcome of every served analysis (route taken, latency,
//! success flag) into bounded per-route windows, and aggregate those
//! windows into an operator-facing summary on demand.
//!
//! ## Guarantees
//! - Memory is bounded: each route keeps at most `window_size` samples,
//!   oldest evicted first.
//! - Recording is cheap and lock-scoped; no allocation beyond the ring.
//! - Percentiles use the nearest-rank method over the current window.
//!
//! ## NOT Responsible For
//! - Prometheus export (see `metrics`)
//! - Making routing decisions from the recorded history

use crate::resilience::CircuitState;
use crate::routing::RouteType;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

/// One recorded response outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetric {
    /// Which path served the response.
    pub route: RouteType,
    /// End-to-end latency of the analysis in milliseconds.
    pub latency_ms: u64,
    /// Whether the response was served without a downstream failure.
    /// A static fallback still counts as a successful serve.
    pub success: bool,
    /// Failure classification when `success` is false (e.g. "timeout").
    pub error_kind: Option<String>,
    /// When the response completed.
    pub timestamp: SystemTime,
}

impl ResponseMetric {
    /// A successful serve on `route` taking `latency_ms`.
    pub fn success(route: RouteType, latency_ms: u64) -> Self {
        Self {
            route,
            latency_ms,
            success: true,
            error_kind: None,
            timestamp: SystemTime::now(),
        }
    }

    /// A failed serve on `route` with a failure classification.
    pub fn failure(route: RouteType, latency_ms: u64, error_kind: impl Into<String>) -> Self {
        Self {
            route,
            latency_ms,
            success: false,
            error_kind: Some(error_kind.into()),
            timestamp: SystemTime::now(),
        }
    }
}

/// Bounded sliding window over one route's recent outcomes.
#[derive(Debug, Default)]
struct RouteWindow {
    samples: VecDeque<ResponseMetric>,
    /// Monotonic totals, unaffected by window eviction.
    total: u64,
    failures: u64,
}

impl RouteWindow {
    fn record(&mut self, metric: ResponseMetric, window_size: usize) {
        self.total += 1;
        if !metric.success {
            self.failures += 1;
        }
        if self.samples.len() >= window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(metric);
    }

    /// Nearest-rank percentile over the window's latencies.
    ///
    /// Returns 0 for an empty window.
    fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut latencies: Vec<u64> = self.samples.iter().map(|m| m.latency_ms).collect();
        latencies.sort_unstable();
        let rank = ((p / 100.0) * latencies.len() as f64).ceil() as usize;
        let idx = rank.saturating_sub(1).min(latencies.len() - 1);
        latencies[idx]
    }

    fn stats(&self) -> RouteStats {
        RouteStats {
            total: self.total,
            failures: self.failures,
            window_len: self.samples.len(),
            p50_ms: self.percentile(50.0),
            p95_ms: self.percentile(95.0),
            p99_ms: self.percentile(99.0),
        }
    }
}

/// Aggregated statistics for one route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStats {
    /// Responses served on this route since startup.
    pub total: u64,
    /// Downstream failures recorded on this route since startup.
    pub failures: u64,
    /// Samples currently held in the sliding window.
    pub window_len: usize,
    /// Median latency over the window, milliseconds.
    pub p50_ms: u64,
    /// 95th-percentile latency over the window, milliseconds.
    pub p95_ms: u64,
    /// 99th-percentile latency over the window, milliseconds.
    pub p99_ms: u64,
}

/// Operator-facing snapshot of the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Total responses served across all routes.
    pub total_responses: u64,
    /// Fraction of responses served without a downstream failure.
    pub success_rate: f64,
    /// Cache hits over all responses that could have hit the cache
    /// (cache hits plus dynamic and hybrid serves).
    pub cache_hit_ratio: f64,
    /// Per-route breakdown: static path.
    pub static_route: RouteStats,
    /// Per-route breakdown: dynamic path.
    pub dynamic_route: RouteStats,
    /// Per-route breakdown: hybrid path.
    pub hybrid_route: RouteStats,
    /// Per-route breakdown: cache hits.
    pub cache_hit_route: RouteStats,
    /// Circuit breaker state at snapshot time.
    pub circuit_state: CircuitState,
}

/// Thread-safe collector of response outcomes, one window per route.
#[derive(Debug)]
pub struct TelemetryCollector {
    window_size: usize,
    static_route: Mutex<RouteWindow>,
    dynamic_route: Mutex<RouteWindow>,
    hybrid_route: Mutex<RouteWindow>,
    cache_hit_route: Mutex<RouteWindow>,
}

impl TelemetryCollector {
    /// Default samples retained per route.
    pub const DEFAULT_WINDOW: usize = 1000;

    /// Create a collector keeping `window_size` samples per route.
    ///
    /// A window size of 0 is treated as 1.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            static_route: Mutex::new(RouteWindow::default()),
            dynamic_route: Mutex::new(RouteWindow::default()),
            hybrid_route: Mutex::new(RouteWindow::default()),
            cache_hit_route: Mutex::new(RouteWindow::default()),
        }
    }

    /// Record one served response.
    ///
    /// # Panics
    ///
    /// This function never panics. A poisoned window lock is recovered,
    /// since the guarded data stays consistent under all record paths.
    pub fn record(&self, metric: ResponseMetric) {
        let window = self.window_for(metric.route);
        let mut guard = window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.record(metric, self.window_size);
    }

    /// Snapshot aggregated statistics for all routes.
    ///
    /// The caller supplies the live circuit breaker state so the summary
    /// reflects one consistent moment.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn summary(&self, circuit_state: CircuitState) -> TelemetrySummary {
        let static_route = self.stats_for(RouteType::Static);
        let dynamic_route = self.stats_for(RouteType::Dynamic);
        let hybrid_route = self.stats_for(RouteType::Hybrid);
        let cache_hit_route = self.stats_for(RouteType::CacheHit);

        let total = static_route.total
            + dynamic_route.total
            + hybrid_route.total
            + cache_hit_route.total;
        let failures = static_route.failures
            + dynamic_route.failures
            + hybrid_route.failures
            + cache_hit_route.failures;

        let success_rate = if total == 0 {
            1.0
        } else {
            (total - failures) as f64 / total as f64
        };

        let cacheable = cache_hit_route.total + dynamic_route.total + hybrid_route.total;
        let cache_hit_ratio = if cacheable == 0 {
            0.0
        } else {
            cache_hit_route.total as f64 / cacheable as f64
        };

        TelemetrySummary {
            total_responses: total,
            success_rate,
            cache_hit_ratio,
            static_route,
            dynamic_route,
            hybrid_route,
            cache_hit_route,
            circuit_state,
        }
    }

    /// Per-route statistics.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn stats_for(&self, route: RouteType) -> RouteStats {
        let guard = self
            .window_for(route)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.stats()
    }

    fn window_for(&self, route: RouteType) -> &Mutex<RouteWindow> {
        match route {
            RouteType::Static => &self.static_route,
            RouteType::Dynamic => &self.dynamic_route,
            RouteType::Hybrid => &self.hybrid_route,
            RouteType::CacheHit => &self.cache_hit_route,
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(route: RouteType, latency_ms: u64, success: bool) -> ResponseMetric {
        if success {
            ResponseMetric::success(route, latency_ms)
        } else {
            ResponseMetric::failure(route, latency_ms, "timeout")
        }
    }

    #[test]
    fn test_empty_collector_summary() {
        let collector = TelemetryCollector::new(100);
        let summary = collector.summary(CircuitState::Closed);
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.success_rate, 1.0);
        assert_eq!(summary.cache_hit_ratio, 0.0);
        assert_eq!(summary.static_route.p99_ms, 0);
    }

    #[test]
    fn test_record_updates_route_totals() {
        let collector = TelemetryCollector::new(100);
        collector.record(metric(RouteType::Static, 2, true));
        collector.record(metric(RouteType::Static, 3, true));
        collector.record(metric(RouteType::Dynamic, 150, false));

        let stats = collector.stats_for(RouteType::Static);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failures, 0);

        let dyn_stats = collector.stats_for(RouteType::Dynamic);
        assert_eq!(dyn_stats.total, 1);
        assert_eq!(dyn_stats.failures, 1);
    }

    #[test]
    fn test_window_evicts_oldest_beyond_capacity() {
        let collector = TelemetryCollector::new(10);
        for i in 0..25 {
            collector.record(metric(RouteType::Hybrid, i, true));
        }
        let stats = collector.stats_for(RouteType::Hybrid);
        assert_eq!(stats.window_len, 10, "window must stay bounded");
        assert_eq!(stats.total, 25, "totals must survive eviction");
        // Window now holds latencies 15..=24, so the median is 19.
        assert_eq!(stats.p50_ms, 19);
    }

    #[test]
    fn test_nearest_rank_percentiles() {
        let collector = TelemetryCollector::new(1000);
        // Latencies 1..=100: p50 = 50, p95 = 95, p99 = 99.
        for i in 1..=100 {
            collector.record(metric(RouteType::Dynamic, i, true));
        }
        let stats = collector.stats_for(RouteType::Dynamic);
        assert_eq!(stats.p50_ms, 50);
        assert_eq!(stats.p95_ms, 95);
        assert_eq!(stats.p99_ms, 99);
    }

    #[test]
    fn test_single_sample_percentiles() {
        let collector = TelemetryCollector::new(100);
        collector.record(metric(RouteType::Static, 7, true));
        let stats = collector.stats_for(RouteType::Static);
        assert_eq!(stats.p50_ms, 7);
        assert_eq!(stats.p99_ms, 7);
    }

    #[test]
    fn test_success_rate_mixes_routes() {
        let collector = TelemetryCollector::new(100);
        for _ in 0..8 {
            collector.record(metric(RouteType::Static, 1, true));
        }
        collector.record(metric(RouteType::Dynamic, 100, false));
        collector.record(metric(RouteType::Hybrid, 80, false));

        let summary = collector.summary(CircuitState::Open);
        assert_eq!(summary.total_responses, 10);
        assert!((summary.success_rate - 0.8).abs() < 1e-9);
        assert_eq!(summary.circuit_state, CircuitState::Open);
    }

    #[test]
    fn test_cache_hit_ratio_excludes_static() {
        let collector = TelemetryCollector::new(100);
        // 100 static serves should not dilute the ratio.
        for _ in 0..100 {
            collector.record(metric(RouteType::Static, 1, true));
        }
        for _ in 0..3 {
            collector.record(metric(RouteType::CacheHit, 1, true));
        }
        collector.record(metric(RouteType::Dynamic, 120, true));

        let summary = collector.summary(CircuitState::Closed);
        assert!((summary.cache_hit_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let collector = TelemetryCollector::new(10);
        collector.record(metric(RouteType::CacheHit, 0, true));
        let summary = collector.summary(CircuitState::HalfOpen);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("cache_hit_ratio"));
        assert!(json.contains("half_open"));
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        use std::sync::Arc;

        let collector = Arc::new(TelemetryCollector::new(1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&collector);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    c.record(metric(RouteType::Dynamic, i, true));
                }
            }));
        }
        for h in handles {
            let _ = h.join();
        }
        assert_eq!(collector.stats_for(RouteType::Dynamic).total, 800);
    }
}
