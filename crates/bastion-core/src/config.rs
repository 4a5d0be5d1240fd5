//! Gateway configuration loading: JSON file, then environment, then validation.

use bastion_types::{ConfigError, GatewayConfig};
use std::fs;
use std::path::Path;
use validator::Validate;

pub const CONFIG_ENV: &str = "BASTION_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "bastion.json";
pub const PORT_ENV: &str = "BASTION_PORT";
pub const REDIS_URL_ENV: &str = "BASTION_REDIS_URL";

/// Load configuration from `path` and the process environment.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Like [`load_config`], reading overrides through `lookup`.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        GatewayConfig::default()
    };

    apply_env_overrides(&mut config, lookup)?;
    config.validate().map_err(|e| ConfigError::from_validation(&e))?;
    Ok(config)
}

fn apply_env_overrides(
    config: &mut GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(port) = lookup(PORT_ENV) {
        config.port = port.trim().parse().map_err(|_| ConfigError::InvalidOverride {
            var: PORT_ENV.to_string(),
            message: format!("'{port}' is not a port number"),
        })?;
    }
    if let Some(url) = lookup(REDIS_URL_ENV) {
        let url = url.trim();
        config.redis_url = (!url.is_empty()).then(|| url.to_string());
    }
    Ok(())
}
