//! # Stage: Pattern Detection
//!
//! ## Responsibility
//! Classify free-form text against a library of known anti-patterns,
//! producing a weighted confidence score and supporting evidence per
//! pattern.
//!
//! ## Guarantees
//! - Pure: detection reads the text and the immutable library, nothing
//!   else. Identical inputs yield identical results.
//! - Deterministic order: one result per pattern, in library order.
//! - All regexes are compiled and validated at load time; a malformed
//!   definition aborts startup instead of failing per request.
//!
//! ## NOT Responsible For
//! - Choosing a response strategy (see `routing`)
//! - Rendering advice text (see `service`)

pub mod engine;
pub mod pattern;

// Re-exports
pub use engine::{DetectionEngine, DetectionResult, Detector, RegexCache};
pub use pattern::{Indicator, NegativeIndicator, PatternDefinition, PatternLibrary, Severity};
