//! # Stage: Configuration
//!
//! ## Responsibility
//! Define the full tuning surface of the pipeline as typed TOML sections
//! with per-field defaults, load it once at startup, and reject invalid
//! values before any traffic is served.
//!
//! ## Guarantees
//! - Every field has a default; an empty file is a valid configuration.
//! - Validation failures are fatal at load time, never per request.
//!
//! ## NOT Responsible For
//! - Hot reload (configuration is immutable after startup)

mod loader;
mod validation;

pub use loader::load_config;

use crate::routing::RouterConfig;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration, one section per pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Pattern detection engine settings.
    pub detection: DetectionConfig,
    /// Hybrid router settings.
    pub routing: RouterConfig,
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Telemetry collector settings.
    pub telemetry: TelemetryConfig,
    /// Observability endpoint settings.
    pub observability: ObservabilityConfig,
}

/// Detection engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DetectionConfig {
    /// TOML file holding the pattern library. `None` uses the built-in
    /// library.
    pub pattern_file: Option<PathBuf>,
    /// Bound on the compiled-regex cache.
    pub regex_cache_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pattern_file: None,
            regex_cache_size: 256,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open trial successes before it closes again.
    pub success_threshold: u32,
    /// Seconds to stay open before allowing a trial call.
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout_secs: 60,
        }
    }
}

impl BreakerConfig {
    /// The recovery timeout as a [`Duration`].
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

/// Telemetry collector settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Samples retained per route type.
    pub window_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { window_size: 1000 }
    }
}

/// Observability endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Listen address for the metrics/summary HTTP endpoint.
    pub listen_addr: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl AdvisorConfig {
    /// Export the JSON schema of the configuration surface, for editor
    /// completion and CI validation of deployment configs.
    ///
    /// # Panics
    ///
    /// This function never panics: the schema derives from static type
    /// information and always serializes.
    pub fn export_schema() -> String {
        let schema = schema_for!(AdvisorConfig);
        serde_json::to_string_pretty(&schema)
            .unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_valid_defaults() {
        let config: AdvisorConfig = toml::from_str("").unwrap();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.breaker.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.routing.static_threshold, 0.7);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.telemetry.window_size, 1000);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: AdvisorConfig = toml::from_str(
            r#"
[breaker]
failure_threshold = 3

[routing]
static_threshold = 0.8
"#,
        )
        .unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.routing.static_threshold, 0.8);
    }

    #[test]
    fn test_schema_export_mentions_sections() {
        let schema = AdvisorConfig::export_schema();
        assert!(schema.contains("breaker"));
        assert!(schema.contains("static_threshold"));
    }
}
