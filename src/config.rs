//! Settings file at ~/.sitefence/config.json.
//!
//! Every field has a default; a missing file means "all defaults".

use crate::site::{DirectoryError, FileSiteDirectory, HttpSiteDirectory, SelectionStore, SiteDirectory};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// How long to wait for the device position.
pub const DEFAULT_POSITION_TIMEOUT_MS: u64 = 15_000;
/// Pause between selecting a site and checking it.
pub const DEFAULT_SELECT_CHECK_DELAY_MS: u64 = 500;
/// Lifetime of the out-of-range advisory.
pub const DEFAULT_ADVISORY_TTL_MS: u64 = 4_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote site directory endpoint.
    pub directory_url: Option<String>,
    /// Local site list, used when no URL is configured.
    pub sites_file: Option<PathBuf>,
    /// Key-value store file.
    pub storage_path: Option<PathBuf>,
    pub position_timeout_ms: u64,
    pub select_check_delay_ms: u64,
    pub advisory_ttl_ms: u64,
    pub show_alerts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory_url: None,
            sites_file: None,
            storage_path: None,
            position_timeout_ms: DEFAULT_POSITION_TIMEOUT_MS,
            select_check_delay_ms: DEFAULT_SELECT_CHECK_DELAY_MS,
            advisory_ttl_ms: DEFAULT_ADVISORY_TTL_MS,
            show_alerts: true,
        }
    }
}

impl Settings {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitefence")
            .join("config.json")
    }

    pub fn position_timeout(&self) -> Duration {
        Duration::from_millis(self.position_timeout_ms)
    }

    pub fn select_check_delay(&self) -> Duration {
        Duration::from_millis(self.select_check_delay_ms)
    }

    pub fn advisory_ttl(&self) -> Duration {
        Duration::from_millis(self.advisory_ttl_ms)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(SelectionStore::default_path)
    }

    /// Build the configured directory. The URL wins over the file.
    pub fn site_directory(&self) -> Result<Box<dyn SiteDirectory>, DirectoryError> {
        if let Some(ref url) = self.directory_url {
            return Ok(Box::new(HttpSiteDirectory::new(url.clone())));
        }
        if let Some(ref path) = self.sites_file {
            return Ok(Box::new(FileSiteDirectory::new(path.clone())));
        }
        Err(DirectoryError::NotConfigured)
    }
}
