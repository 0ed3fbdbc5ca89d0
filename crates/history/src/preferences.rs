//! Persistence for user-facing history preferences.
//!
//! Only the entry limit and the thumbnail height are remembered between
//! sessions. History contents are never written anywhere.

use crate::config::{validate_max_entries, validate_thumbnail_height, ConfigError, HistoryConfig};
use crate::store::SnapshotHistory;
use crate::surface::Surface;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Key holding the undo entry limit
pub const KEY_MAX_ENTRIES: &str = "history.maxEntries";

/// Key holding the thumbnail height
pub const KEY_THUMBNAIL_HEIGHT: &str = "history.thumbnailHeight";

const PREFERENCES_FILE: &str = "history-preferences.json";

/// Errors from a preference backend
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("preferences I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed preferences file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not determine the config directory")]
    NoConfigDir,
}

/// String key-value backend for preferences
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), PreferencesError>;
}

/// Volatile store, for hosts without persistent settings and for tests
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferenceStore {
    values: BTreeMap<String, String>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PreferencesError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a flat JSON object on disk
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFilePreferenceStore {
    /// `<config_dir>/photo-editor/history-preferences.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photo-editor").join(PREFERENCES_FILE))
    }

    /// Open the store at [`default_path`](Self::default_path).
    pub fn open_default() -> Result<Self, PreferencesError> {
        let path = Self::default_path().ok_or(PreferencesError::NoConfigDir)?;
        Self::open(path)
    }

    /// Open a store, loading existing values. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| PreferencesError::Json {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(PreferencesError::Io { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), PreferencesError> {
        let io_err = |source| PreferencesError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.values).map_err(|source| {
            PreferencesError::Json {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PreferencesError> {
        self.values.insert(key.to_string(), value);
        self.write()
    }
}

/// Remembered history settings. `None` means "not set, keep the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
}

impl HistoryPreferences {
    /// Read preferences from a store. Unparsable values are dropped with a warning.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        Self {
            max_entries: read_value(store, KEY_MAX_ENTRIES),
            thumbnail_height: read_value(store, KEY_THUMBNAIL_HEIGHT),
        }
    }

    /// Write every set preference to the store.
    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<(), PreferencesError> {
        if let Some(max_entries) = self.max_entries {
            store.set(KEY_MAX_ENTRIES, max_entries.to_string())?;
        }
        if let Some(height) = self.thumbnail_height {
            store.set(KEY_THUMBNAIL_HEIGHT, height.to_string())?;
        }
        Ok(())
    }

    /// Current settings of a live history
    pub fn capture<S: Surface>(history: &SnapshotHistory<S>) -> Self {
        Self {
            max_entries: Some(history.limits().max_entries),
            thumbnail_height: Some(history.thumbnail_settings().height),
        }
    }

    /// Apply through the history's runtime controls.
    ///
    /// Every set value is attempted. Rejected values leave the previous
    /// setting in place; the first rejection is returned.
    pub fn apply_to<S: Surface>(&self, history: &mut SnapshotHistory<S>) -> Result<(), ConfigError> {
        let mut first_error = None;

        if let Some(max_entries) = self.max_entries {
            if let Err(err) = history.set_max_entries(max_entries) {
                tracing::warn!(%err, "ignoring stored max entries");
                first_error.get_or_insert(err);
            }
        }
        if let Some(height) = self.thumbnail_height {
            if let Err(err) = history.set_thumbnail_height(height) {
                tracing::warn!(%err, "ignoring stored thumbnail height");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Overlay the valid preferences onto an init config.
    pub fn apply_to_config(&self, config: HistoryConfig) -> HistoryConfig {
        let mut config = config;
        if let Some(max_entries) = self.max_entries.and_then(|v| validate_max_entries(v).ok()) {
            config.max_entries = max_entries;
        }
        if let Some(height) = self
            .thumbnail_height
            .and_then(|v| validate_thumbnail_height(v).ok())
        {
            config.thumbnail_height = height;
        }
        config
    }
}

fn read_value<T: std::str::FromStr>(store: &dyn PreferenceStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "discarding unparsable preference");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelBuffer;
    use crate::surface::MemorySurface;
    use tempfile::TempDir;

    fn history() -> SnapshotHistory<MemorySurface> {
        let surface = MemorySurface::new(PixelBuffer::filled(2, 2, [1, 2, 3, 255]));
        SnapshotHistory::new(surface, HistoryConfig::default().with_thumbnail_workers(0)).unwrap()
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryPreferenceStore::new();
        let prefs = HistoryPreferences {
            max_entries: Some(12),
            thumbnail_height: Some(64),
        };
        prefs.save(&mut store).unwrap();

        assert_eq!(store.get(KEY_MAX_ENTRIES).as_deref(), Some("12"));
        assert_eq!(HistoryPreferences::load(&store), prefs);
    }

    #[test]
    fn test_unparsable_values_are_dropped() {
        let mut store = MemoryPreferenceStore::new();
        store.set(KEY_MAX_ENTRIES, "lots".to_string()).unwrap();
        store.set(KEY_THUMBNAIL_HEIGHT, "72".to_string()).unwrap();

        let prefs = HistoryPreferences::load(&store);
        assert_eq!(prefs.max_entries, None);
        assert_eq!(prefs.thumbnail_height, Some(72));
    }

    #[test]
    fn test_json_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(PREFERENCES_FILE);

        let mut store = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(store.get(KEY_MAX_ENTRIES), None);
        store.set(KEY_MAX_ENTRIES, "30".to_string()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_MAX_ENTRIES).as_deref(), Some("30"));
    }

    #[test]
    fn test_json_file_store_reports_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFilePreferenceStore::open(&path),
            Err(PreferencesError::Json { .. })
        ));
    }

    #[test]
    fn test_apply_uses_runtime_controls() {
        let mut history = history();
        let prefs = HistoryPreferences {
            max_entries: Some(7),
            thumbnail_height: Some(128),
        };

        prefs.apply_to(&mut history).unwrap();

        assert_eq!(history.limits().max_entries, 7);
        assert_eq!(history.thumbnail_settings().height, 128);
        assert_eq!(HistoryPreferences::capture(&history), prefs);
    }

    #[test]
    fn test_apply_rejects_invalid_and_keeps_previous() {
        let mut history = history();
        let prefs = HistoryPreferences {
            max_entries: Some(0),
            thumbnail_height: Some(64),
        };

        let err = prefs.apply_to(&mut history).unwrap_err();

        assert_eq!(err, ConfigError::InvalidMaxEntries);
        assert_eq!(history.limits().max_entries, 50);
        assert_eq!(history.thumbnail_settings().height, 64);
    }

    #[test]
    fn test_apply_to_config_skips_invalid() {
        let prefs = HistoryPreferences {
            max_entries: Some(20),
            thumbnail_height: Some(9000),
        };
        let config = prefs.apply_to_config(HistoryConfig::default());

        assert_eq!(config.max_entries, 20);
        assert_eq!(config.thumbnail_height, 96);
    }
}
