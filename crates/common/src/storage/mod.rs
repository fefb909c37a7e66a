//! Persistence seam for session state.
//!
//! The client persists sessions as namespaced string keys. [`SessionStorage`]
//! abstracts the medium so the session codec can be tested against an
//! in-memory double; [`FileStorage`] is the production implementation (a
//! single JSON document on disk). [`SafeStorage`] layers capacity accounting
//! and stale-session eviction on top and degrades to "skip and log" instead
//! of surfacing storage failures to callers.

mod file;
mod memory;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::session::keys;

/// Soft cap on the total size of persisted state, in bytes.
pub const MAX_STORE_BYTES: usize = 5 * 1024 * 1024;

/// Fraction of [`MAX_STORE_BYTES`] at which stale-data cleanup kicks in.
const CLEANUP_THRESHOLD: f64 = 0.8;

/// Persisted sessions older than this are evicted during cleanup.
const MAX_SESSION_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Errors surfaced by storage implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("storage serialization error: {0}")]
    Serialization(String),

    #[error("storage capacity exceeded: {attempted} bytes against a cap of {cap}")]
    CapacityExceeded { attempted: usize, cap: usize },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// String key-value persistence for session state.
///
/// Implementations must be safe to share across threads; the client holds a
/// single instance for the life of the process.
pub trait SessionStorage: Send + Sync {
    /// Read a value, `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, overwriting any existing entry.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently present.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Degrade-instead-of-fail wrapper around a [`SessionStorage`].
///
/// Session persistence is best effort: a failed write must never fail the
/// network call that triggered it. Reads fall back to `None`, writes report
/// success as a `bool`, and every degraded path is logged.
#[derive(Clone)]
pub struct SafeStorage {
    inner: Arc<dyn SessionStorage>,
}

impl SafeStorage {
    pub fn new(inner: Arc<dyn SessionStorage>) -> Self {
        Self { inner }
    }

    /// Read a value; storage failures degrade to `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.inner.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "session storage read failed");
                None
            }
        }
    }

    /// Write a value, evicting stale data first when near capacity.
    ///
    /// Returns `false` if the value could not be stored even after cleanup.
    pub fn set(&self, key: &str, value: &str) -> bool {
        let projected = self.current_size() + key.len() + value.len();
        if projected as f64 > MAX_STORE_BYTES as f64 * CLEANUP_THRESHOLD {
            self.cleanup_stale();
        }

        match self.inner.set(key, value) {
            Ok(()) => true,
            Err(StorageError::CapacityExceeded { .. }) => {
                self.cleanup_stale();
                match self.inner.set(key, value) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(key, error = %err, "session storage write failed after cleanup");
                        false
                    }
                }
            }
            Err(err) => {
                warn!(key, error = %err, "session storage write failed");
                false
            }
        }
    }

    /// Remove a key; storage failures degrade to `false`.
    pub fn remove(&self, key: &str) -> bool {
        match self.inner.remove(key) {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "session storage remove failed");
                false
            }
        }
    }

    /// Total bytes held across all keys and values.
    pub fn current_size(&self) -> usize {
        let keys = match self.inner.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "session storage size accounting failed");
                return 0;
            }
        };

        keys.iter()
            .map(|key| key.len() + self.get(key).map(|v| v.len()).unwrap_or(0))
            .sum()
    }

    /// Record the time of the most recent session write.
    ///
    /// Cleanup uses this to decide whether the persisted session is stale.
    pub fn touch_session_timestamp(&self) {
        let now = Utc::now().timestamp_millis();
        self.set(keys::SESSION_TIMESTAMP, &now.to_string());
    }

    /// Evict the persisted session if it has gone stale.
    ///
    /// Returns the number of bytes freed.
    pub fn cleanup_stale(&self) -> usize {
        let Some(stamp) = self.get(keys::SESSION_TIMESTAMP) else {
            return 0;
        };
        let Ok(written_at) = stamp.parse::<i64>() else {
            self.remove(keys::SESSION_TIMESTAMP);
            return stamp.len() + keys::SESSION_TIMESTAMP.len();
        };

        let age = Utc::now().timestamp_millis() - written_at;
        if age <= MAX_SESSION_AGE_MS {
            return 0;
        }

        let mut freed = 0;
        if let Some(session) = self.get(keys::SESSION) {
            freed += session.len() + keys::SESSION.len();
            self.remove(keys::SESSION);
        }
        freed += stamp.len() + keys::SESSION_TIMESTAMP.len();
        self.remove(keys::SESSION_TIMESTAMP);

        debug!(freed, "evicted stale persisted session");
        freed
    }
}
