//! Anti-pattern definitions and the library that holds them.
//!
//! Definitions are plain data, loadable from TOML. Weight and threshold
//! ranges are enforced by [`PatternLibrary::validate`] before any regex is
//! compiled, so a bad library is rejected as a whole at startup.

use serde::{Deserialize, Serialize};

/// Allowed range for positive indicator weights.
pub const INDICATOR_WEIGHT_RANGE: (f64, f64) = (0.1, 0.5);
/// Allowed range for negative indicator weights.
pub const NEGATIVE_WEIGHT_RANGE: (f64, f64) = (-0.5, -0.1);
/// Allowed range for detection thresholds.
pub const THRESHOLD_RANGE: (f64, f64) = (0.1, 1.0);

/// How severe a detected pattern is for the advisory output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; worth a mention.
    Info,
    /// Likely to cause friction; should be addressed.
    Warning,
    /// Known to cause real damage; should block.
    Critical,
}

/// A weighted positive signal: matching this regex raises confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    /// Short human-readable name, used as evidence.
    pub label: String,
    /// Regex source, compiled case-insensitively at load time.
    pub pattern: String,
    /// Contribution to confidence when the regex matches. In `[0.1, 0.5]`.
    pub weight: f64,
}

/// A weighted negative signal: matching this regex lowers confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeIndicator {
    /// Short human-readable name, used as evidence.
    pub label: String,
    /// Regex source, compiled case-insensitively at load time.
    pub pattern: String,
    /// Contribution to confidence when the regex matches. In `[-0.5, -0.1]`.
    pub weight: f64,
}

/// One anti-pattern the engine can recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    /// Stable identifier, e.g. `"reinventing-the-sdk"`.
    pub id: String,
    /// Grouping for reporting, e.g. `"architecture"`.
    pub category: String,
    /// Severity of a confirmed detection.
    pub severity: Severity,
    /// Positive signals, evaluated in order.
    pub indicators: Vec<Indicator>,
    /// Negative signals that argue against the pattern.
    #[serde(default)]
    pub negative_indicators: Vec<NegativeIndicator>,
    /// Minimum clamped confidence for `detected = true`. In `[0.1, 1.0]`.
    pub threshold: f64,
    /// Canned explanation served on the static path.
    pub advice: String,
}

/// The full set of patterns active for this process.
///
/// Immutable after load. Order is significant: detection results are
/// returned in library order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLibrary {
    /// Patterns in evaluation order.
    pub patterns: Vec<PatternDefinition>,
}

impl PatternLibrary {
    /// Parse a library from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML parse error verbatim; range validation is a
    /// separate step (see [`validate`](Self::validate)).
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate weight and threshold ranges.
    ///
    /// Returns a list of human-readable problems; empty means valid.
    /// Regex compilation is checked later, when the engine is built.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.patterns.is_empty() {
            errors.push("pattern library is empty".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for p in &self.patterns {
            if !seen.insert(p.id.as_str()) {
                errors.push(format!("duplicate pattern id '{}'", p.id));
            }
            if p.indicators.is_empty() {
                errors.push(format!("pattern '{}' has no indicators", p.id));
            }
            if p.threshold < THRESHOLD_RANGE.0 || p.threshold > THRESHOLD_RANGE.1 {
                errors.push(format!(
                    "pattern '{}': threshold {} outside [{}, {}]",
                    p.id, p.threshold, THRESHOLD_RANGE.0, THRESHOLD_RANGE.1
                ));
            }
            for ind in &p.indicators {
                if ind.weight < INDICATOR_WEIGHT_RANGE.0 || ind.weight > INDICATOR_WEIGHT_RANGE.1 {
                    errors.push(format!(
                        "pattern '{}', indicator '{}': weight {} outside [{}, {}]",
                        p.id, ind.label, ind.weight, INDICATOR_WEIGHT_RANGE.0,
                        INDICATOR_WEIGHT_RANGE.1
                    ));
                }
            }
            for neg in &p.negative_indicators {
                if neg.weight < NEGATIVE_WEIGHT_RANGE.0 || neg.weight > NEGATIVE_WEIGHT_RANGE.1 {
                    errors.push(format!(
                        "pattern '{}', negative indicator '{}': weight {} outside [{}, {}]",
                        p.id, neg.label, neg.weight, NEGATIVE_WEIGHT_RANGE.0,
                        NEGATIVE_WEIGHT_RANGE.1
                    ));
                }
            }
        }

        errors
    }

    /// Look up a pattern by id.
    pub fn find(&self, id: &str) -> Option<&PatternDefinition> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// A small built-in library for demos and tests.
    ///
    /// Production deployments load their own library from TOML instead.
    pub fn builtin() -> Self {
        Self {
            patterns: vec![
                PatternDefinition {
                    id: "reinventing-the-sdk".to_string(),
                    category: "architecture".to_string(),
                    severity: Severity::Warning,
                    indicators: vec![
                        Indicator {
                            label: "custom implementation".to_string(),
                            pattern: r"custom\s+(http\s+)?(client|implementation|wrapper|parser)"
                                .to_string(),
                            weight: 0.4,
                        },
                        Indicator {
                            label: "avoiding standard approach".to_string(),
                            pattern: r"instead\s+of\s+(using\s+)?(the|their|an?\s+official)?\s*(sdk|library|standard)"
                                .to_string(),
                            weight: 0.4,
                        },
                        Indicator {
                            label: "from scratch".to_string(),
                            pattern: r"from\s+scratch".to_string(),
                            weight: 0.2,
                        },
                    ],
                    negative_indicators: vec![NegativeIndicator {
                        label: "sdk is unmaintained".to_string(),
                        pattern: r"(sdk|library)\s+is\s+(unmaintained|deprecated|abandoned)"
                            .to_string(),
                        weight: -0.3,
                    }],
                    threshold: 0.5,
                    advice: "Prefer the official SDK over a custom client. Hand-rolled \
                             integrations drift from the API surface and re-create solved \
                             problems (auth refresh, retries, pagination)."
                        .to_string(),
                },
                PatternDefinition {
                    id: "premature-optimization".to_string(),
                    category: "process".to_string(),
                    severity: Severity::Info,
                    indicators: vec![
                        Indicator {
                            label: "optimizing before measuring".to_string(),
                            pattern: r"optimi[sz]e\w*\s+(before|without)\s+(measuring|profiling|benchmark)"
                                .to_string(),
                            weight: 0.4,
                        },
                        Indicator {
                            label: "micro-optimization language".to_string(),
                            pattern: r"(shave|squeeze)\s+(a\s+few\s+)?(ms|millis|cycles|nanoseconds)"
                                .to_string(),
                            weight: 0.3,
                        },
                    ],
                    negative_indicators: vec![NegativeIndicator {
                        label: "profile data cited".to_string(),
                        pattern: r"(profil(e|er|ing)|flamegraph|benchmark)\s+(shows|data|results)"
                            .to_string(),
                        weight: -0.4,
                    }],
                    threshold: 0.4,
                    advice: "Measure first. Profile the workload, find the actual hot path, \
                             and only then optimize it."
                        .to_string(),
                },
                PatternDefinition {
                    id: "big-bang-rewrite".to_string(),
                    category: "architecture".to_string(),
                    severity: Severity::Critical,
                    indicators: vec![
                        Indicator {
                            label: "full rewrite".to_string(),
                            pattern: r"(complete|full|total|ground.?up)\s+rewrite".to_string(),
                            weight: 0.5,
                        },
                        Indicator {
                            label: "replace everything at once".to_string(),
                            pattern: r"replace\s+(everything|the\s+whole|all\s+of)".to_string(),
                            weight: 0.3,
                        },
                    ],
                    negative_indicators: vec![NegativeIndicator {
                        label: "incremental migration planned".to_string(),
                        pattern: r"(incremental|strangler|phase[sd]?|step.?by.?step)\s+(migration|rollout|approach)"
                            .to_string(),
                        weight: -0.4,
                    }],
                    threshold: 0.5,
                    advice: "Rewrites fail when they land all at once. Carve the system into \
                             seams and migrate piece by piece behind a stable interface."
                        .to_string(),
                },
            ],
        }
    }
}
