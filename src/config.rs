//! # Configuration Module
//!
//! Configuration management and data directory setup for Encore.
//!
//! ## Data Storage
//!
//! The persisted event log lives in the platform-standard data directory:
//! - Linux: `~/.local/share/encore/`
//! - macOS: `~/Library/Application Support/encore/`
//! - Windows: `%APPDATA%\encore\`
//!
//! ## Runtime Settings
//!
//! [`RuntimeConfig`] carries everything the CLI wires into the services: the
//! store location, the music API root, the optional bearer token used for
//! history sync, and the sync quiet period.

use crate::history::SYNC_DELAY;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// API root used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

const APP_DIR: &str = "encore";
const STORE_FILE: &str = "history.db";

/// Returns the platform-appropriate data directory for Encore, creating it
/// if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The encore subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let encore_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&encore_dir).with_context(|| {
        format!(
            "Failed to create Encore data directory at {}. Please check file permissions.",
            encore_dir.display()
        )
    })?;

    Ok(encore_dir)
}

/// Returns the path of the SQLite file holding the persisted history.
///
/// # Examples
///
/// ```no_run
/// use encore::config::get_store_path;
///
/// let store = get_store_path()?;
/// println!("History store: {}", store.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_store_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(STORE_FILE))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Path to the history store
    pub store_path: PathBuf,
    /// Music API root, without a trailing slash
    pub api_url: String,
    /// Bearer token for history sync; sync is skipped without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Quiet period before a remote sync fires, in seconds
    pub sync_delay_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store_path: get_store_path().unwrap_or_else(|_| PathBuf::from(STORE_FILE)),
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            sync_delay_secs: SYNC_DELAY.as_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Create a new runtime configuration rooted in the data directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            store_path: get_store_path()?,
            ..Self::default()
        })
    }

    /// Create configuration with an explicit store path
    #[must_use]
    pub fn with_store_path(store_path: PathBuf) -> Self {
        Self {
            store_path,
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            sync_delay_secs: SYNC_DELAY.as_secs(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Blank tokens count as no token.
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn sync_delay(&self) -> Duration {
        Duration::from_secs(self.sync_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_store_path_returns_valid_path() {
        let path = get_store_path().expect("Should get valid path");

        assert_eq!(path.file_name().unwrap(), "history.db");
        let parent = path.parent().expect("Store path should have parent");
        assert_eq!(parent.file_name().unwrap(), "encore");
        assert!(parent.is_dir());
    }

    #[test]
    fn test_get_store_path_consistent_results() {
        let path1 = get_store_path().expect("First call should succeed");
        let path2 = get_store_path().expect("Second call should succeed");

        assert_eq!(path1, path2);
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::with_store_path(PathBuf::from("/tmp/h.db"));

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.access_token, None);
        assert_eq!(config.sync_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_normalizes() {
        let config = RuntimeConfig::with_store_path(PathBuf::from("h.db"))
            .with_api_url("https://music.example/api/")
            .with_access_token(Some("  ".to_string()));

        assert_eq!(config.api_url, "https://music.example/api");
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn test_serde_shape() {
        let config = RuntimeConfig::with_store_path(PathBuf::from("h.db"))
            .with_access_token(Some("secret".to_string()));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["storePath"], "h.db");
        assert_eq!(json["accessToken"], "secret");
        assert_eq!(json["syncDelaySecs"], 5);

        let back: RuntimeConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
