//! Startup configuration loading.
//!
//! One entry point, one failure mode: any problem (missing file, bad TOML,
//! failed validation) is an [`AdvisorError::Config`], and the process is
//! expected to abort before serving traffic.

use super::AdvisorConfig;
use crate::AdvisorError;
use std::path::Path;
use tracing::info;

/// Load and validate configuration.
///
/// `path = None` yields the built-in defaults (still validated, so default
/// drift is caught in tests rather than production).
///
/// # Errors
///
/// Returns [`AdvisorError::Config`] if the file cannot be read, does not
/// parse as TOML, or fails range validation.
///
/// # Panics
///
/// This function never panics.
pub fn load_config(path: Option<&Path>) -> Result<AdvisorConfig, AdvisorError> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                AdvisorError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            let config: AdvisorConfig = toml::from_str(&text).map_err(|e| {
                AdvisorError::Config(format!("cannot parse {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), "configuration loaded");
            config
        }
        None => {
            info!("using default configuration");
            AdvisorConfig::default()
        }
    };

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(AdvisorError::Config(errors.join("; ")));
    }
    Ok(config)
}
