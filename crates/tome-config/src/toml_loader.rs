//! TOML config file loading and creation.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use tome_common::ConfigError;

use crate::schema::TomeConfig;
use crate::validation;

const DEFAULT_CONFIG_TOML: &str = r#"# Tome configuration.
# Missing sections and fields fall back to built-in defaults.

[api]
# Proxied API base used for buffered requests.
base_url = "http://localhost:3000/api"
# Backend origin used for streaming requests (bypasses the proxy, which
# would otherwise buffer the response body).
backend_origin = "http://localhost:5055"
connect_timeout_secs = 10
request_timeout_secs = 120

[auth]
# record_path = "/path/to/auth.json"

[locale]
default = "en-US"
"#;

/// Load config from a specific TOML file path.
///
/// After parsing, the config is validated; validation failures are logged
/// as warnings and the parsed config is returned as-is.
pub fn load_from_path(path: &Path) -> Result<TomeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.to_path_buf()))?;

    let config: TomeConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e} — using parsed config as-is");
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// If the file does not exist, creates a commented default config file and
/// returns defaults.
pub fn load_default() -> Result<TomeConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(&path)?;
            Ok(TomeConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Platform-specific default config file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("tome").join("config.toml"))
}

/// Create a default TOML config file with documentation comments.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TOML).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}
