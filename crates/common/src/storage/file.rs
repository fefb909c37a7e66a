//! File-backed storage: all keys live in a single JSON document.
//!
//! The document is read once at construction and rewritten atomically
//! (write-to-temp, rename) on every mutation. An unreadable document is
//! treated as empty rather than as a hard failure; session restore handles
//! the resulting unauthenticated state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use super::{SessionStorage, StorageError, MAX_STORE_BYTES};

/// Key-value storage persisted as a JSON object on disk.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    capacity: usize,
}

impl FileStorage {
    /// Open (or create) storage at `path` with the default capacity.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_capacity(path, MAX_STORE_BYTES)
    }

    /// Open storage with an explicit byte capacity.
    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = Self::read_document(&path);
        Ok(Self { path, entries: Mutex::new(entries), capacity })
    }

    fn read_document(path: &Path) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "session file unreadable; starting empty");
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "session file corrupt; starting empty");
                BTreeMap::new()
            }
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let raw = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();

        let attempted = entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len();
        if attempted > self.capacity {
            return Err(StorageError::CapacityExceeded { attempted, cap: self.capacity });
        }

        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(err) = self.flush(&entries) {
            // Roll back so memory and disk stay consistent.
            match previous {
                Some(previous) => {
                    entries.insert(key.to_string(), previous);
                }
                None => {
                    entries.remove(key);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set("integram_server", "https://app.example.com").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get("integram_server").unwrap().as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("absent.json")).unwrap();

        assert_eq!(storage.get("anything").unwrap(), None);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.keys().unwrap().is_empty());

        // Writing replaces the corrupt document.
        storage.set("key", "value").unwrap();
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("key").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("session.json")).unwrap();

        storage.set("key", "value").unwrap();
        storage.remove("key").unwrap();
        storage.remove("key").unwrap();
        assert_eq!(storage.get("key").unwrap(), None);
    }

    #[test]
    fn capacity_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            FileStorage::with_capacity(dir.path().join("session.json"), 8).unwrap();

        storage.set("ab", "cd").unwrap();
        let result = storage.set("ef", "too-long");
        assert!(matches!(result, Err(StorageError::CapacityExceeded { .. })));
    }
}
