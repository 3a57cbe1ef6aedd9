//! 50-request load run with a mid-run downstream outage.
//!
//! Drives the full pipeline through three phases - healthy, outage,
//! recovered - and prints a narrated per-request log plus batch
//! snapshots, then asserts the breaker opened during the outage, served
//! everything statically while open, and closed again after recovery.

use async_trait::async_trait;
use pattern_advisor::config::AdvisorConfig;
use pattern_advisor::detect::PatternLibrary;
use pattern_advisor::generate::{GenerateError, Generator};
use pattern_advisor::resilience::CircuitState;
use pattern_advisor::routing::RouteType;
use pattern_advisor::service::{AdvisorService, CallerContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Generator whose health the test script controls.
struct ScriptedGenerator {
    healthy: Arc<AtomicBool>,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _deadline: Duration) -> Result<String, GenerateError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(format!("[analysis] {prompt}"))
        } else {
            Err(GenerateError::Transport("injected outage".to_string()))
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug)]
struct RequestLog {
    index: usize,
    route: RouteType,
    breaker_after: CircuitState,
    latency_ms: u64,
}

#[tokio::test]
async fn test_fifty_requests_through_an_outage() {
    const TOTAL: usize = 50;
    const OUTAGE_START: usize = 10;
    const OUTAGE_END: usize = 25;
    const FAILURE_THRESHOLD: u32 = 5;

    let healthy = Arc::new(AtomicBool::new(true));
    let mut config = AdvisorConfig::default();
    config.breaker.failure_threshold = FAILURE_THRESHOLD;
    config.breaker.recovery_timeout_secs = 1;

    let service = AdvisorService::new(
        &config,
        PatternLibrary::builtin(),
        Arc::new(ScriptedGenerator {
            healthy: Arc::clone(&healthy),
        }),
    )
    .unwrap();

    // Rich context keeps every request on the dynamic path; distinct
    // queries keep the cache out of the picture.
    let ctx = CallerContext::new().with_file_paths(vec!["src/pipeline.rs".to_string()]);

    let mut log: Vec<RequestLog> = Vec::with_capacity(TOTAL);

    println!("──────────────────────────────────────────────────");
    println!(" 50-request run: outage at #{OUTAGE_START}, repair at #{OUTAGE_END}");
    println!("──────────────────────────────────────────────────");

    for i in 0..TOTAL {
        if i == OUTAGE_START {
            healthy.store(false, Ordering::SeqCst);
            println!(" >> downstream goes dark");
        }
        if i == OUTAGE_END {
            healthy.store(true, Ordering::SeqCst);
            println!(" >> downstream repaired, waiting out the recovery timeout");
            tokio::time::sleep(Duration::from_millis(1200)).await;
        }

        let result = service
            .analyze(&format!("design question number {i}"), &ctx)
            .await;
        let entry = RequestLog {
            index: i,
            route: result.route_type,
            breaker_after: service.breaker().state(),
            latency_ms: result.latency_ms,
        };
        println!(
            " #{:02}  route={:<9} breaker={:?}  {}ms",
            entry.index,
            entry.route.as_str(),
            entry.breaker_after,
            entry.latency_ms
        );
        log.push(entry);

        if (i + 1) % 10 == 0 {
            let summary = service.summary();
            println!(
                " ── batch {:>2}: served={} success_rate={:.2} state={:?}",
                (i + 1) / 10,
                summary.total_responses,
                summary.success_rate,
                summary.circuit_state
            );
        }
    }

    let summary = service.summary();
    println!("──────────────────────────────────────────────────");
    println!(
        " final: served={} dynamic_failures={} state={:?}",
        summary.total_responses, summary.dynamic_route.failures, summary.circuit_state
    );

    // Every request got an answer.
    assert_eq!(log.len(), TOTAL);
    assert_eq!(summary.total_responses, TOTAL as u64);

    // Healthy lead-in stayed dynamic with the breaker closed.
    for entry in &log[..OUTAGE_START] {
        assert_eq!(entry.route, RouteType::Dynamic, "request {}", entry.index);
        assert_eq!(entry.breaker_after, CircuitState::Closed);
    }

    // Exactly the threshold's worth of failures opened the circuit; the
    // open breaker turned the rest of the outage into static serves.
    assert_eq!(summary.dynamic_route.failures, u64::from(FAILURE_THRESHOLD));
    let opened_at = OUTAGE_START + FAILURE_THRESHOLD as usize;
    for entry in &log[OUTAGE_START..opened_at] {
        assert_eq!(entry.route, RouteType::Static, "request {}", entry.index);
    }
    assert_eq!(log[opened_at - 1].breaker_after, CircuitState::Open);
    for entry in &log[opened_at..OUTAGE_END] {
        assert_eq!(entry.route, RouteType::Static, "request {}", entry.index);
        assert_eq!(entry.breaker_after, CircuitState::Open);
    }

    // After repair and the recovery window, trials succeed and the
    // circuit closes for the rest of the run.
    assert_eq!(log[OUTAGE_END].route, RouteType::Dynamic);
    assert_eq!(
        log[OUTAGE_END + 1].breaker_after,
        CircuitState::Closed,
        "two trial successes close the circuit"
    );
    for entry in &log[OUTAGE_END + 2..] {
        assert_eq!(entry.route, RouteType::Dynamic, "request {}", entry.index);
        assert_eq!(entry.breaker_after, CircuitState::Closed);
    }

    assert_eq!(summary.circuit_state, CircuitState::Closed);
}
