//! Range validation for the loaded configuration.
//!
//! Each section validates independently; problems are collected and
//! reported together so an operator fixes one file pass, not one error at
//! a time.

use super::{AdvisorConfig, BreakerConfig, CacheConfig, DetectionConfig, TelemetryConfig};

impl AdvisorConfig {
    /// Validate every section. Returns human-readable problems; empty
    /// means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.detection.validate());
        errors.extend(self.routing.validate());
        errors.extend(self.breaker.validate());
        errors.extend(self.cache.validate());
        errors.extend(self.telemetry.validate());
        errors
    }
}

impl DetectionConfig {
    pub(super) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.regex_cache_size == 0 {
            errors.push("detection.regex_cache_size must be at least 1".to_string());
        }
        errors
    }
}

impl BreakerConfig {
    pub(super) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.failure_threshold == 0 {
            errors.push("breaker.failure_threshold must be at least 1".to_string());
        }
        if self.success_threshold == 0 {
            errors.push("breaker.success_threshold must be at least 1".to_string());
        }
        if self.recovery_timeout_secs == 0 {
            errors.push("breaker.recovery_timeout_secs must be at least 1".to_string());
        }
        errors
    }
}

impl CacheConfig {
    pub(super) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_entries == 0 {
            errors.push("cache.max_entries must be at least 1".to_string());
        }
        errors
    }
}

impl TelemetryConfig {
    pub(super) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.window_size == 0 {
            errors.push("telemetry.window_size must be at least 1".to_string());
        }
        errors
    }
}
