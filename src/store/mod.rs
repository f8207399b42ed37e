//! JSON-file persistence for dialogs, journals, the error profile,
//! the coin ledger and practice sessions
//!
//! All files live under a single logs directory owned exclusively by
//! [`LogStore`]. Reads tolerate missing or corrupt files by degrading to an
//! empty default; writes go through an atomic temp-file-plus-rename so a
//! crash mid-write leaves either the old or the new contents. Mutations are
//! serialized through a process-local mutex.

pub mod coins;
pub mod dialogs;
pub mod journal;
pub mod profile;
pub mod sessions;

pub use coins::CoinsLedger;
pub use dialogs::{DialogRecord, DialogStats};
pub use journal::{
    AggressionIncident, ErrorLogEntry, ErrorSummary, HelpRequestEntry,
    AGGRESSIVE_LANGUAGE_KIND, API_ERROR_KIND, DIALOG_SUMMARY_KIND,
};
pub use profile::{ErrorProfile, ErrorProfileEntry, HistoryEvent};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Dialog transcript files kept on disk after retention
pub const DEFAULT_KEEP_DIALOGS: usize = 3;

/// Typed store error, wrapped into `anyhow` at call sites that need context
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Owner of the on-disk JSON files
pub struct LogStore {
    logs_dir: PathBuf,
    keep_dialogs: usize,
    lock: Mutex<()>,
}

impl LogStore {
    /// Create a store at the default data location
    pub fn new() -> Result<Self> {
        let logs_dir = crate::config::data_dir()?.join("logs");
        Self::with_retention(logs_dir, DEFAULT_KEEP_DIALOGS)
    }

    /// Create a store with a custom directory
    pub fn with_dir(logs_dir: PathBuf) -> Result<Self> {
        Self::with_retention(logs_dir, DEFAULT_KEEP_DIALOGS)
    }

    /// Create a store with a custom directory and retention window
    pub fn with_retention(logs_dir: PathBuf, keep_dialogs: usize) -> Result<Self> {
        std::fs::create_dir_all(&logs_dir)
            .context("Failed to create logs directory")?;
        Ok(Self {
            logs_dir,
            keep_dialogs,
            lock: Mutex::new(()),
        })
    }

    /// The logs directory path
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub(crate) fn keep_dialogs(&self) -> usize {
        self.keep_dialogs
    }

    pub(crate) fn file_path(&self, name: &str) -> PathBuf {
        self.logs_dir.join(name)
    }

    pub(crate) fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another caller panicked mid-write;
        // the file itself is still either old or new thanks to the rename.
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read a JSON file, degrading to the default on any failure
    pub(crate) fn read_json_or_default<T>(&self, path: &Path) -> T
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            return T::default();
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return T::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                T::default()
            }
        }
    }

    /// Serialize to a sibling temp file, then rename into place
    pub(crate) fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Read-modify-write append to a JSON array file
    pub(crate) fn append_to_array<T>(&self, filename: &str, entry: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let path = self.file_path(filename);
        let _guard = self.guard();
        let mut entries: Vec<T> = self.read_json_or_default(&path);
        entries.push(entry);
        self.write_json_atomic(&path, &entries)
            .with_context(|| format!("Failed to write {}", filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        let entries: Vec<String> = store.read_json_or_default(&store.file_path("missing.json"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_read_corrupt_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        std::fs::write(store.file_path("bad.json"), "{not json at all").unwrap();
        let entries: Vec<String> = store.read_json_or_default(&store.file_path("bad.json"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_atomic_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        let path = store.file_path("value.json");
        store.write_json_atomic(&path, &vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = store.read_json_or_default(&path);
        assert_eq!(back, vec![1, 2, 3]);
        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_append_to_array_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        store.append_to_array("items.json", "first".to_string()).unwrap();
        store.append_to_array("items.json", "second".to_string()).unwrap();
        let back: Vec<String> = store.read_json_or_default(&store.file_path("items.json"));
        assert_eq!(back, vec!["first", "second"]);
    }
}
