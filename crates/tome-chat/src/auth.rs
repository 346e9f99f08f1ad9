//! Persisted auth record resolution.
//!
//! The host's login flow persists a JSON record shaped
//! `{"state":{"token":"<bearer>"}}`. The store is passed into chat
//! components explicitly and reads the record fresh on every call, so a
//! token rotation takes effect on the next request without a restart.
//! A missing or unreadable record is not an error: the request proceeds
//! unauthenticated and the backend decides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthRecord {
    #[serde(default)]
    state: AuthState,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthState {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &tome_config::TomeConfig) -> Self {
        match &config.auth.record_path {
            Some(path) => Self::new(path.clone()),
            None => Self::new(Self::default_path()),
        }
    }

    /// Platform default record location: `<config_dir>/tome/auth.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tome")
            .join("auth.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the bearer token from the record. Fresh read on every call.
    pub fn resolve_token(&self) -> Option<String> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        let record: AuthRecord = match serde_json::from_str(&data) {
            Ok(record) => record,
            Err(e) => {
                warn!("failed to parse auth record at {}: {e}", self.path.display());
                return None;
            }
        };
        record.state.token.filter(|token| !token.is_empty())
    }

    /// Write capability for the host's login flow.
    pub fn persist_token(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = AuthRecord {
            state: AuthState {
                token: Some(token.to_string()),
            },
        };
        let data = serde_json::to_string_pretty(&record).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, data)
    }

    /// Remove the record. Clearing an absent record is not an error.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> AuthStore {
        AuthStore::new(dir.path().join("auth.json"))
    }

    #[test]
    fn missing_record_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).resolve_token(), None);
    }

    #[test]
    fn malformed_record_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.resolve_token(), None);
    }

    #[test]
    fn record_without_token_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"state":{}}"#).unwrap();
        assert_eq!(store.resolve_token(), None);

        std::fs::write(store.path(), r#"{"state":{"token":""}}"#).unwrap();
        assert_eq!(store.resolve_token(), None);
    }

    #[test]
    fn persist_then_resolve_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist_token("tok-123").unwrap();
        assert_eq!(store.resolve_token(), Some("tok-123".to_string()));
    }

    #[test]
    fn rotation_is_visible_on_next_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist_token("old").unwrap();
        assert_eq!(store.resolve_token(), Some("old".to_string()));

        store.persist_token("new").unwrap();
        assert_eq!(store.resolve_token(), Some("new".to_string()));
    }

    #[test]
    fn clear_removes_record_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist_token("tok").unwrap();
        store.clear().unwrap();
        assert_eq!(store.resolve_token(), None);
        store.clear().unwrap();
    }

    #[test]
    fn reads_the_hosts_record_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"state":{"token":"bearer-abc","user":{"name":"ana"}},"version":3}"#,
        )
        .unwrap();
        assert_eq!(store.resolve_token(), Some("bearer-abc".to_string()));
    }
}
