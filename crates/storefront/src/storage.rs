//! Durable key/value storage for cart state.
//!
//! Mirrors the browser `localStorage` contract (string keys, string values)
//! so the cart can persist the same `shoppingCart` document it always has.
//! The server keeps one [`FileStorage`] directory per cart.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::error;

/// Storage key holding the JSON array of cart items.
pub const SHOPPING_CART_KEY: &str = "shoppingCart";

/// Errors that can occur when reading or writing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key contains characters that cannot name a file.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A previous writer panicked while holding the lock.
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A `localStorage`-style string store.
pub trait LocalStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// =============================================================================
// FileStorage
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go through a temporary file and a rename so a crash mid-write
/// never leaves a truncated document behind. Inside a tokio runtime
/// `set_item` only records the value and a blocking-pool task writes it,
/// latest value per key winning; reads see unwritten values first. Outside
/// a runtime the write happens inline.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    writes: Arc<PendingWrites>,
}

#[derive(Debug, Default)]
struct PendingWrites {
    values: Mutex<HashMap<String, String>>,
    flushing: AtomicBool,
}

impl FileStorage {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writes: Arc::default(),
        }
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether every accepted write has reached disk.
    #[cfg(test)]
    fn is_flushed(&self) -> bool {
        self.writes
            .values
            .lock()
            .is_ok_and(|values| values.is_empty())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn write_file(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Write recorded values until none are left.
    ///
    /// Only one flush runs per store. An entry is dropped once the value on
    /// disk matches it; a newer value recorded mid-write stays for the next
    /// round.
    fn flush(&self) {
        loop {
            let batch = match self.writes.values.lock() {
                Ok(values) => values.clone(),
                Err(_) => {
                    error!(dir = %self.dir.display(), "Storage lock poisoned, dropping writes");
                    self.writes.flushing.store(false, Ordering::Release);
                    return;
                }
            };

            if batch.is_empty() {
                self.writes.flushing.store(false, Ordering::Release);
                // A value may have landed between the snapshot and the flag
                // reset; pick it up unless another flush already has.
                let more = self
                    .writes
                    .values
                    .lock()
                    .is_ok_and(|values| !values.is_empty());
                if more && !self.writes.flushing.swap(true, Ordering::AcqRel) {
                    continue;
                }
                return;
            }

            for (key, value) in batch {
                if let Err(e) = self.write_file(&key, &value) {
                    error!(error = %e, key = %key, dir = %self.dir.display(), "Error writing storage file");
                }
                if let Ok(mut values) = self.writes.values.lock()
                    && values.get(&key) == Some(&value)
                {
                    values.remove(&key);
                }
            }
        }
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        {
            let values = self.writes.values.lock().map_err(|_| StorageError::Poisoned)?;
            if let Some(value) = values.get(key) {
                return Ok(Some(value.clone()));
            }
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.path_for(key)?;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return self.write_file(key, value);
        };

        self.writes
            .values
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_string(), value.to_string());

        if !self.writes.flushing.swap(true, Ordering::AcqRel) {
            let storage = self.clone();
            runtime.spawn_blocking(move || storage.flush());
        }
        Ok(())
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// Process-local store, used in tests and when no data directory is set.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
