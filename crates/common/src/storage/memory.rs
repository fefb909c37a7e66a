//! In-memory storage, used in tests and for ephemeral (non-persisted)
//! clients.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{SessionStorage, StorageError};

/// Key-value storage backed by a process-local map.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage bounded to `capacity` total bytes, for exercising overflow
    /// handling.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Mutex::new(BTreeMap::new()), capacity: Some(capacity) }
    }

    fn size_after_insert(entries: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
        entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if let Some(cap) = self.capacity {
            let attempted = Self::size_after_insert(&entries, key, value);
            if attempted > cap {
                return Err(StorageError::CapacityExceeded { attempted, cap });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
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
    fn overwrite_replaces_value() {
        let storage = MemoryStorage::new();
        storage.set("key", "one").unwrap();
        storage.set("key", "two").unwrap();

        assert_eq!(storage.get("key").unwrap().as_deref(), Some("two"));
        assert_eq!(storage.keys().unwrap(), vec!["key".to_string()]);
    }

    #[test]
    fn capacity_counts_replaced_entry_once() {
        let storage = MemoryStorage::with_capacity(10);
        storage.set("key", "aaaaaaa").unwrap();

        // Replacing the value must not double-count the old entry.
        storage.set("key", "bbbbbbb").unwrap();

        let result = storage.set("other", "x");
        assert!(matches!(result, Err(StorageError::CapacityExceeded { .. })));
    }
}
