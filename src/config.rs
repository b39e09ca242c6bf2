//! Configuration types for appview-bridge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reference ceiling for simultaneous batch transfers
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;

/// How long shutdown waits for running calls before aborting them
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Remote download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum transfers in flight for one batch download (default: 4)
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// User-Agent header sent with every fetch (None = reqwest default)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: default_max_concurrent_transfers(),
            user_agent: None,
        }
    }
}

/// SQLite storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file name, created inside the documents directory
    /// (default: "app-view.sqlite")
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

/// Static web resources staged into the documents directory at startup
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Directory holding bundled web files (None = nothing to stage)
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

/// Main configuration for [`AppView`](crate::AppView)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) - batch concurrency, HTTP identity
/// - [`storage`](StorageConfig) - SQLite database location
/// - [`resources`](ResourceConfig) - startup resource staging
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory every file operation resolves against (default: "./documents")
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Remote download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// SQLite storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Resource staging settings
    #[serde(default)]
    pub resources: ResourceConfig,

    /// Time the executor gives running calls to finish at shutdown, in
    /// milliseconds; calls still running afterwards are aborted (default: 5000)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            download: DownloadConfig::default(),
            storage: StorageConfig::default(),
            resources: ResourceConfig::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Config {
    /// Create a config rooted at the given documents directory, all else default
    pub fn with_documents_dir(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            ..Default::default()
        }
    }

    /// Full path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.documents_dir.join(&self.storage.database_file)
    }

    /// Shutdown drain timeout as a [`Duration`](std::time::Duration)
    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Check settings that serde defaults cannot guarantee
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_transfers == 0 {
            return Err(Error::Config {
                message: "max_concurrent_transfers must be at least 1".to_string(),
                key: Some("download.max_concurrent_transfers".to_string()),
            });
        }

        let file = self.storage.database_file.as_str();
        if file.is_empty() || file.contains(['/', '\\']) || file == "." || file == ".." {
            return Err(Error::Config {
                message: format!("database_file must be a plain file name, got \"{}\"", file),
                key: Some("storage.database_file".to_string()),
            });
        }

        Ok(())
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_max_concurrent_transfers() -> usize {
    DEFAULT_MAX_CONCURRENT_TRANSFERS
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

fn default_database_file() -> String {
    "app-view.sqlite".to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = Config::default();
        assert_eq!(config.download.max_concurrent_transfers, 4);
        assert_eq!(config.storage.database_file, "app-view.sqlite");
        assert!(config.resources.source_dir.is_none());
        assert_eq!(config.shutdown_timeout(), std::time::Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.documents_dir, PathBuf::from("./documents"));
        assert_eq!(config.download.max_concurrent_transfers, 4);
    }

    #[test]
    fn partial_sub_config_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"download": {"user_agent": "bridge-test"}}"#).unwrap();
        assert_eq!(config.download.max_concurrent_transfers, 4);
        assert_eq!(config.download.user_agent.as_deref(), Some("bridge-test"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.download.max_concurrent_transfers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("download.max_concurrent_transfers"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn database_file_must_be_a_basename() {
        let mut config = Config::default();
        config.storage.database_file = "../escape.sqlite".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn database_path_is_inside_documents() {
        let config = Config::with_documents_dir("/tmp/docs");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/docs/app-view.sqlite")
        );
    }
}
