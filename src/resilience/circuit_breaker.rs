//! Circuit Breaker
//!
//! Prevents cascading failures by stopping calls to a failing downstream
//! generation capability.
//!
//! ## States
//! - **Closed**: normal operation, calls flow through
//! - **Open**: downstream failing, calls rejected immediately
//! - **HalfOpen**: recovery timeout elapsed, trial calls allowed through
//!
//! ## Transitions
//! - Closed → Open when consecutive failures reach `failure_threshold`
//! - Open → HalfOpen once `recovery_timeout` has elapsed; the next call
//!   acquired after that point is the trial
//! - HalfOpen → Closed after `success_threshold` consecutive trial successes
//! - HalfOpen → Open on any trial failure
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use pattern_advisor::resilience::{CircuitBreaker, CircuitBreakerError};
//! # #[tokio::main]
//! # async fn main() {
//! let breaker = CircuitBreaker::new(5, 2, Duration::from_secs(60));
//!
//! match breaker.call(|| async {
//!     // Your downstream call - replace with a real generation request
//!     Ok::<&str, &str>("generated advice")
//! }).await {
//!     Ok(result) => println!("{result}"),
//!     Err(CircuitBreakerError::Open) => {
//!         // Circuit open, serve the static fallback
//!     }
//!     Err(CircuitBreakerError::Failed(e)) => {
//!         eprintln!("generation failed: {e}");
//!     }
//! }
//! # }
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed - calls flow through normally.
    Closed,
    /// Circuit is open - calls are rejected immediately without invoking
    /// the downstream capability.
    Open,
    /// Circuit is half-open - trial calls are let through to test recovery.
    HalfOpen,
}

/// Errors returned by [`CircuitBreaker::call`].
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the call was rejected without touching the downstream.
    Open,
    /// The downstream operation itself failed.
    Failed(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Consecutive failures while Closed (resets on any success).
    consecutive_failures: u32,
    /// Consecutive trial successes while HalfOpen.
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    last_transition: Instant,
}

/// Process-wide three-state circuit breaker guarding the generation path.
///
/// One instance per process, constructed explicitly and shared via
/// `Arc` - never a hidden module-level singleton, so tests can substitute
/// fresh instances without cross-test leakage.
///
/// All counters and the state field live behind a single small mutex; the
/// guard is never held across an `.await`, so the fast-fail check costs a
/// lock/flip/unlock and nothing more.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    success_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    /// Create a new breaker in the Closed state.
    ///
    /// # Arguments
    /// * `failure_threshold` - consecutive failures before opening (default 5)
    /// * `success_threshold` - consecutive half-open successes before closing (default 2)
    /// * `recovery_timeout` - how long to stay Open before allowing a trial (default 60s)
    pub fn new(failure_threshold: u32, success_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                last_transition: Instant::now(),
            }),
            failure_threshold,
            success_threshold,
            recovery_timeout,
        }
    }

    /// Lock the inner state, recovering from a poisoned mutex.
    ///
    /// The guarded struct holds only plain counters, so a panic in another
    /// thread cannot leave it in a half-written state worth rejecting.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check whether a call may proceed, transitioning Open → HalfOpen when
    /// the recovery timeout has elapsed.
    ///
    /// This is the O(1) fast-fail check: while Open (pre-timeout) it returns
    /// `Err(())` immediately without invoking anything downstream.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` when the circuit is open and the recovery timeout
    /// has not yet elapsed. Callers map this to
    /// [`AdvisorError::CircuitOpen`](crate::AdvisorError::CircuitOpen).
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn try_acquire(&self) -> Result<(), ()> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed());
                if elapsed.is_some_and(|e| e >= self.recovery_timeout) {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.last_transition = Instant::now();
                    info!("circuit breaker: transitioning to half-open");
                    Ok(())
                } else {
                    debug!("circuit breaker: call rejected (open)");
                    Err(())
                }
            }
        }
    }

    /// Record a successful downstream call.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures > 0 {
                    debug!(
                        failures = inner.consecutive_failures,
                        "circuit breaker: resetting failure streak"
                    );
                    inner.consecutive_failures = 0;
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    inner.last_transition = Instant::now();
                    info!("circuit breaker: closing (downstream recovered)");
                } else {
                    debug!(
                        successes = inner.consecutive_successes,
                        needed = self.success_threshold,
                        "circuit breaker: half-open trial succeeded"
                    );
                }
            }
            CircuitState::Open => {
                // A straggler from before the circuit opened; the streak
                // semantics are consecutive, so it carries no weight here.
                debug!("circuit breaker: success recorded while open, ignored");
            }
        }
    }

    /// Record a failed downstream call (including timeouts).
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.last_transition = Instant::now();
                    warn!(
                        failures = inner.consecutive_failures,
                        threshold = self.failure_threshold,
                        "circuit breaker: opening (threshold reached)"
                    );
                } else {
                    debug!(
                        failures = inner.consecutive_failures,
                        threshold = self.failure_threshold,
                        "circuit breaker: failure recorded"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                inner.last_transition = Instant::now();
                warn!("circuit breaker: reopening (half-open trial failed)");
            }
            CircuitState::Open => {
                debug!("circuit breaker: additional failure while open");
            }
        }
    }

    /// Execute an operation through the breaker: acquire, run, record.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] if the circuit rejected the
    /// call, or [`CircuitBreakerError::Failed`] wrapping the operation's
    /// own error.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if self.try_acquire().is_err() {
            return Err(CircuitBreakerError::Open);
        }

        let result = f().await;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }

        result.map_err(CircuitBreakerError::Failed)
    }

    /// Return the current state without side effects.
    ///
    /// Note: a breaker that is Open past its recovery timeout still reports
    /// `Open` here. The HalfOpen transition happens on the next acquired
    /// call, never from a passive read.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Return the state the next caller would observe: a breaker that is
    /// Open past its recovery timeout reports `HalfOpen`, without
    /// performing the transition (that still happens on acquire).
    ///
    /// Routing decisions use this view so a recovered-in-principle breaker
    /// does not pin every request to the static path forever.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn effective_state(&self) -> CircuitState {
        let inner = self.lock();
        if inner.state == CircuitState::Open
            && inner
                .opened_at
                .is_some_and(|t| t.elapsed() >= self.recovery_timeout)
        {
            CircuitState::HalfOpen
        } else {
            inner.state
        }
    }

    /// Return a snapshot of breaker statistics.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            time_in_current_state: inner.last_transition.elapsed(),
        }
    }

    /// Manually reset the breaker to Closed (operator action).
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
        inner.last_transition = Instant::now();
        info!("circuit breaker: manually reset to closed");
    }

    /// Force the breaker open (for maintenance windows or testing).
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn trip(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.last_transition = Instant::now();
        warn!("circuit breaker: manually tripped to open");
    }
}

/// Snapshot of circuit breaker statistics.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    /// Current state of the breaker.
    pub state: CircuitState,
    /// Consecutive failures in the current Closed streak.
    pub consecutive_failures: u32,
    /// Consecutive trial successes in the current HalfOpen streak.
    pub consecutive_successes: u32,
    /// Wall-clock time spent in the current state.
    pub time_in_current_state: Duration,
}
