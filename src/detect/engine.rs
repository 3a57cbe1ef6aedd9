//! Weighted regex detection engine.
//!
//! Scoring is additive over indicator presence: every positive indicator
//! whose regex matches the text anywhere contributes its weight once, no
//! matter how many times it matches; negative indicators subtract the same
//! way. The raw sum may leave `[0, 1]` before clamping; evidence reflects
//! the raw matches, the clamp affects the score only.

use crate::detect::pattern::{PatternDefinition, PatternLibrary};
use crate::AdvisorError;
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

/// Outcome of matching one pattern against one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Id of the pattern this result is for.
    pub pattern_id: String,
    /// Clamped confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether confidence reached the pattern's threshold.
    pub detected: bool,
    /// Labels of every matched indicator, positive and negative.
    pub evidence: Vec<String>,
}

/// Abstraction over the detection step so the router can be tested with a
/// scripted detector instead of the regex engine.
pub trait Detector: Send + Sync {
    /// Match `text` against the active library.
    ///
    /// `focus` restricts evaluation to the named pattern ids; `None` means
    /// the whole library. Results come back in library order either way.
    fn detect(&self, text: &str, focus: Option<&[String]>) -> Vec<DetectionResult>;
}

/// Shared cache of compiled regexes keyed by source string.
///
/// Purely a performance optimization: two patterns sharing an indicator
/// source compile it once. Has no observable effect on results.
pub struct RegexCache {
    inner: Mutex<LruCache<String, Regex>>,
}

impl RegexCache {
    /// Create a cache bounded to `capacity` compiled regexes.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Fetch the compiled form of `source`, compiling case-insensitively
    /// on a miss.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for a malformed source.
    ///
    /// # Panics
    ///
    /// This function never panics. A poisoned lock is recovered since the
    /// cache holds only finished compilations.
    pub fn get_or_compile(&self, source: &str) -> Result<Regex, regex::Error> {
        let mut cache = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(re) = cache.get(source) {
            return Ok(re.clone());
        }
        let re = RegexBuilder::new(source).case_insensitive(true).build()?;
        cache.put(source.to_string(), re.clone());
        Ok(re)
    }

    /// Number of compiled regexes currently cached.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether the cache is empty.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for RegexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexCache").finish_non_exhaustive()
    }
}

/// One pattern with its regexes compiled, index-aligned with the
/// definition's indicator lists.
#[derive(Debug)]
struct CompiledPattern {
    def: PatternDefinition,
    indicators: Vec<Regex>,
    negatives: Vec<Regex>,
}

/// The production [`Detector`]: weighted regex matching over an immutable
/// compiled library.
#[derive(Debug)]
pub struct DetectionEngine {
    patterns: Vec<CompiledPattern>,
}

impl DetectionEngine {
    /// Compile a validated library into an engine.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::Config`] if the library fails range
    /// validation or any indicator regex fails to compile. Either is a
    /// startup-time error; a built engine cannot fail per request.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn new(library: PatternLibrary, cache: &RegexCache) -> Result<Self, AdvisorError> {
        let errors = library.validate();
        if !errors.is_empty() {
            return Err(AdvisorError::Config(errors.join("; ")));
        }

        let mut patterns = Vec::with_capacity(library.patterns.len());
        for def in library.patterns {
            let mut indicators = Vec::with_capacity(def.indicators.len());
            for ind in &def.indicators {
                let re = cache.get_or_compile(&ind.pattern).map_err(|e| {
                    AdvisorError::Config(format!(
                        "pattern '{}', indicator '{}': invalid regex: {e}",
                        def.id, ind.label
                    ))
                })?;
                indicators.push(re);
            }
            let mut negatives = Vec::with_capacity(def.negative_indicators.len());
            for neg in &def.negative_indicators {
                let re = cache.get_or_compile(&neg.pattern).map_err(|e| {
                    AdvisorError::Config(format!(
                        "pattern '{}', negative indicator '{}': invalid regex: {e}",
                        def.id, neg.label
                    ))
                })?;
                negatives.push(re);
            }
            patterns.push(CompiledPattern {
                def,
                indicators,
                negatives,
            });
        }

        Ok(Self { patterns })
    }

    /// Number of patterns in the active library.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// The definition backing a pattern id, if present.
    pub fn definition(&self, pattern_id: &str) -> Option<&PatternDefinition> {
        self.patterns
            .iter()
            .find(|p| p.def.id == pattern_id)
            .map(|p| &p.def)
    }

    fn score(compiled: &CompiledPattern, text: &str) -> DetectionResult {
        let mut raw = 0.0_f64;
        let mut evidence = Vec::new();

        for (re, ind) in compiled.indicators.iter().zip(&compiled.def.indicators) {
            // Match presence, not match count.
            if re.is_match(text) {
                raw += ind.weight;
                evidence.push(ind.label.clone());
            }
        }
        for (re, neg) in compiled
            .negatives
            .iter()
            .zip(&compiled.def.negative_indicators)
        {
            if re.is_match(text) {
                raw += neg.weight;
                evidence.push(neg.label.clone());
            }
        }

        let confidence = raw.clamp(0.0, 1.0);
        DetectionResult {
            pattern_id: compiled.def.id.clone(),
            confidence,
            detected: confidence >= compiled.def.threshold,
            evidence,
        }
    }
}

impl Detector for DetectionEngine {
    fn detect(&self, text: &str, focus: Option<&[String]>) -> Vec<DetectionResult> {
        let results: Vec<DetectionResult> = self
            .patterns
            .iter()
            .filter(|p| match focus {
                Some(ids) => ids.iter().any(|id| *id == p.def.id),
                None => true,
            })
            .map(|p| Self::score(p, text))
            .collect();

        let detected = results.iter().filter(|r| r.detected).count();
        debug!(
            patterns_evaluated = results.len(),
            patterns_detected = detected,
            "detection complete"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::pattern::{Indicator, NegativeIndicator, Severity};

    fn engine() -> DetectionEngine {
        let cache = RegexCache::default();
        DetectionEngine::new(PatternLibrary::builtin(), &cache).unwrap()
    }

    fn single_pattern(def: PatternDefinition) -> DetectionEngine {
        let cache = RegexCache::default();
        DetectionEngine::new(
            PatternLibrary {
                patterns: vec![def],
            },
            &cache,
        )
        .unwrap()
    }

    #[test]
    fn test_custom_client_example_scores_point_eight() {
        let engine = engine();
        let results = engine.detect(
            "We're planning to build a custom HTTP client instead of using their SDK",
            None,
        );
        let sdk = results
            .iter()
            .find(|r| r.pattern_id == "reinventing-the-sdk")
            .unwrap();
        assert!(
            (sdk.confidence - 0.8).abs() < 1e-9,
            "expected 0.4 + 0.4 = 0.8, got {}",
            sdk.confidence
        );
        assert!(sdk.detected);
        assert_eq!(
            sdk.evidence,
            vec!["custom implementation", "avoiding standard approach"]
        );
    }

    #[test]
    fn test_no_match_yields_zero_not_error() {
        let engine = engine();
        let results = engine.detect("the weather is nice today", None);
        assert_eq!(results.len(), engine.pattern_count());
        for r in &results {
            assert_eq!(r.confidence, 0.0);
            assert!(!r.detected);
            assert!(r.evidence.is_empty());
        }
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let engine = engine();
        let results = engine.detect("CUSTOM HTTP CLIENT INSTEAD OF THE SDK", None);
        let sdk = results
            .iter()
            .find(|r| r.pattern_id == "reinventing-the-sdk")
            .unwrap();
        assert!(sdk.confidence > 0.0);
    }

    #[test]
    fn test_repeated_match_counts_once() {
        let def = PatternDefinition {
            id: "repeat".to_string(),
            category: "test".to_string(),
            severity: Severity::Info,
            indicators: vec![Indicator {
                label: "word".to_string(),
                pattern: "hello".to_string(),
                weight: 0.3,
            }],
            negative_indicators: vec![],
            threshold: 0.2,
            advice: "n/a".to_string(),
        };
        let engine = single_pattern(def);
        let results = engine.detect("hello hello hello hello", None);
        assert!((results[0].confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_negative_indicator_lowers_confidence() {
        let engine = engine();
        let with_negative = engine.detect(
            "custom http client instead of the SDK, but the SDK is unmaintained",
            None,
        );
        let sdk = with_negative
            .iter()
            .find(|r| r.pattern_id == "reinventing-the-sdk")
            .unwrap();
        // 0.4 + 0.4 - 0.3 = 0.5, still detected at threshold 0.5.
        assert!((sdk.confidence - 0.5).abs() < 1e-9);
        assert!(sdk.detected);
        assert!(sdk.evidence.contains(&"sdk is unmaintained".to_string()));
    }

    #[test]
    fn test_negative_sum_clamps_to_zero_but_keeps_evidence() {
        let def = PatternDefinition {
            id: "neg".to_string(),
            category: "test".to_string(),
            severity: Severity::Info,
            indicators: vec![Indicator {
                label: "weak signal".to_string(),
                pattern: "maybe".to_string(),
                weight: 0.1,
            }],
            negative_indicators: vec![NegativeIndicator {
                label: "strong counter".to_string(),
                pattern: "definitely not".to_string(),
                weight: -0.5,
            }],
            threshold: 0.1,
            advice: "n/a".to_string(),
        };
        let engine = single_pattern(def);
        let results = engine.detect("maybe, but definitely not", None);
        assert_eq!(results[0].confidence, 0.0);
        assert!(!results[0].detected);
        // Clamp affects the score only; both matches stay visible.
        assert_eq!(results[0].evidence.len(), 2);
    }

    #[test]
    fn test_confidence_clamps_at_one() {
        let def = PatternDefinition {
            id: "stacked".to_string(),
            category: "test".to_string(),
            severity: Severity::Info,
            indicators: vec![
                Indicator {
                    label: "a".to_string(),
                    pattern: "alpha".to_string(),
                    weight: 0.5,
                },
                Indicator {
                    label: "b".to_string(),
                    pattern: "beta".to_string(),
                    weight: 0.5,
                },
                Indicator {
                    label: "c".to_string(),
                    pattern: "gamma".to_string(),
                    weight: 0.5,
                },
            ],
            negative_indicators: vec![],
            threshold: 0.9,
            advice: "n/a".to_string(),
        };
        let engine = single_pattern(def);
        let results = engine.detect("alpha beta gamma", None);
        assert_eq!(results[0].confidence, 1.0);
        assert!(results[0].detected);
    }

    #[test]
    fn test_focus_subset_in_library_order() {
        let engine = engine();
        let focus = vec![
            "big-bang-rewrite".to_string(),
            "reinventing-the-sdk".to_string(),
        ];
        let results = engine.detect("complete rewrite with a custom client", Some(&focus));
        assert_eq!(results.len(), 2);
        // Library order, not focus order.
        assert_eq!(results[0].pattern_id, "reinventing-the-sdk");
        assert_eq!(results[1].pattern_id, "big-bang-rewrite");
    }

    #[test]
    fn test_detect_is_idempotent() {
        let engine = engine();
        let text = "we want a complete rewrite, custom http client instead of the sdk";
        let first = engine.detect(text, None);
        let second = engine.detect(text, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let def = PatternDefinition {
            id: "broken".to_string(),
            category: "test".to_string(),
            severity: Severity::Info,
            indicators: vec![Indicator {
                label: "bad".to_string(),
                pattern: "([unclosed".to_string(),
                weight: 0.3,
            }],
            negative_indicators: vec![],
            threshold: 0.5,
            advice: "n/a".to_string(),
        };
        let cache = RegexCache::default();
        let result = DetectionEngine::new(
            PatternLibrary {
                patterns: vec![def],
            },
            &cache,
        );
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_regex_cache_deduplicates_compilation() {
        let cache = RegexCache::new(16);
        let a = cache.get_or_compile("shared").unwrap();
        let b = cache.get_or_compile("shared").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_regex_cache_evicts_least_recently_used() {
        let cache = RegexCache::new(2);
        let _ = cache.get_or_compile("one").unwrap();
        let _ = cache.get_or_compile("two").unwrap();
        let _ = cache.get_or_compile("three").unwrap();
        assert_eq!(cache.len(), 2);
    }
}
