//! Router tuning knobs.
//!
//! Loaded once at startup as part of the top-level configuration; invalid
//! values are rejected before any traffic is served.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hybrid router.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RouterConfig {
    /// Confidence at or above which a static answer is considered
    /// sufficient.
    pub static_threshold: f64,

    /// Hard deadline for one downstream generation call, seconds.
    pub generation_timeout_secs: u64,

    /// TTL for cached generated responses, seconds.
    pub cache_ttl_secs: u64,
}

fn default_static_threshold() -> f64 {
    0.7
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            static_threshold: default_static_threshold(),
            generation_timeout_secs: default_generation_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RouterConfig {
    /// The generation deadline as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Validate ranges. Returns human-readable problems; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.static_threshold) {
            errors.push(format!(
                "static_threshold {} outside [0.0, 1.0]",
                self.static_threshold
            ));
        }
        if self.generation_timeout_secs == 0 {
            errors.push("generation_timeout_secs must be at least 1".to_string());
        }
        if self.cache_ttl_secs == 0 {
            errors.push("cache_ttl_secs must be at least 1".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RouterConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.static_threshold, 0.7);
        assert_eq!(config.generation_timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = RouterConfig {
            static_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = RouterConfig {
            generation_timeout_secs: 0,
            ..Default::default()
        };
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RouterConfig = toml::from_str("static_threshold = 0.8").unwrap();
        assert_eq!(config.static_threshold, 0.8);
        assert_eq!(config.generation_timeout_secs, 30);
    }
}
