//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// API endpoint configuration.
///
/// `base_url` is the proxied API base used by the buffered request path;
/// `backend_origin` is the backend's own origin, used by the streaming
/// path so responses are not buffered by the reverse proxy in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub backend_origin: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            backend_origin: "http://localhost:5055".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

/// Auth record location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path to the persisted auth record. Defaults to
    /// `<config_dir>/tome/auth.json` when unset.
    pub record_path: Option<PathBuf>,
}

/// Locale selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale tag, e.g. "en-US". Validated against the known set on load.
    pub default: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: "en-US".into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomeConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub locale: LocaleConfig,
}
