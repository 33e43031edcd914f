//! File-backed key-value store at ~/.sitefence/storage.json.
//!
//! Holds the last selected site under `currentOfficeLocation` so a new
//! session starts where the previous one left off. Unreadable files load
//! as empty.

use super::types::SiteLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key the selected site is stored under.
pub const CURRENT_OFFICE_LOCATION_KEY: &str = "currentOfficeLocation";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot write store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize, Clone)]
struct StoreEntry {
    /// JSON-encoded value, kept as text like a device key-value store.
    value: String,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

/// The selection store.
pub struct SelectionStore {
    path: PathBuf,
    entries: BTreeMap<String, StoreEntry>,
}

impl SelectionStore {
    /// Load from the default location (~/.sitefence/storage.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from a specific path.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self { path, entries }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitefence")
            .join("storage.json")
    }

    fn read_file(path: &Path) -> Option<BTreeMap<String, StoreEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn set_item(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                value: value.into(),
                updated_at: Utc::now(),
            },
        );
        self.persist()
    }

    pub fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// The persisted site, if one was saved and still decodes.
    pub fn current_office_location(&self) -> Option<SiteLocation> {
        let raw = self.get_item(CURRENT_OFFICE_LOCATION_KEY)?;
        serde_json::from_str(raw).ok()
    }

    pub fn save_current_office_location(&mut self, site: &SiteLocation) -> Result<(), StoreError> {
        let json = serde_json::to_string(site).map_err(|source| StoreError::Encode {
            key: CURRENT_OFFICE_LOCATION_KEY.to_string(),
            source,
        })?;
        self.set_item(CURRENT_OFFICE_LOCATION_KEY, json)
    }

    pub fn clear_current_office_location(&mut self) -> Result<(), StoreError> {
        self.remove_item(CURRENT_OFFICE_LOCATION_KEY)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| StoreError::Encode {
            key: "*".to_string(),
            source,
        })?;
        fs::write(&self.path, json).map_err(io_err)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
