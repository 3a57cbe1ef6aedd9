//! # Stage: Reliability Primitives
//!
//! ## Responsibility
//! Make the slow generation path safe to call repeatedly under load:
//! a process-wide circuit breaker that fails fast when the downstream is
//! unhealthy, and a TTL response cache that short-circuits repeat requests.
//!
//! ## Guarantees
//! - Breaker state transitions are linearizable: no lost failure/success
//!   counts under concurrent callers, no state oscillation from races.
//! - The open-circuit fast-fail check is O(1) and never waits on a
//!   downstream timeout.
//! - An expired cache entry is never observed by a caller.
//!
//! ## NOT Responsible For
//! - Deciding when to call the downstream (that belongs to `routing`)
//! - Recording latency/outcome history (that belongs to `telemetry`)

pub mod cache;
pub mod circuit_breaker;

// Re-exports
pub use cache::{CacheStats, ResponseCache};
pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerError, CircuitState};
