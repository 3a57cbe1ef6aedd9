//! # Stage: Hybrid Routing
//!
//! ## Responsibility
//! Turn a detection outcome into a response strategy (static, dynamic, or
//! hybrid) and orchestrate the chosen path: cache lookup, breaker-guarded
//! generation under a timeout, cache write, telemetry record, and static
//! fallback on any failure.
//!
//! ## Guarantees
//! - The decision function is pure and deterministic for a fixed context
//!   and a fixed observed breaker state.
//! - Every failure reachable from a live request degrades to a static
//!   response; no error propagates to the caller.
//! - A successful generation is cached even when the requesting caller has
//!   already timed out (background completion).
//!
//! ## NOT Responsible For
//! - Scoring text against patterns (see `detect`)
//! - Rendering the final user-facing reply (see `service`)

pub mod config;
pub mod context;
pub mod router;

// Re-exports
pub use config::RouterConfig;
pub use context::{LatencyClass, ModeHint, RouteDecision, RouteType, RoutingContext, RoutingResult};
pub use router::{HybridRouter, RoutedResponse};
