//! Durable local storage for the cart.
//!
//! The cart store writes its whole state through this key-value interface
//! on every mutation, and reads it back once at startup. Two processes
//! sharing the same storage are last-writer-wins: there is no live sync and
//! no merging, matching the original single-tab ownership model.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// The fixed namespace key the cart persists under.
pub const CART_KEY: &str = "seaglass.cart";

/// Errors from the storage layer.
///
/// Callers degrade on these rather than failing: a cart that cannot be
/// read starts empty, a write failure loses only durability, never the
/// in-memory state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable client-side key-value store.
pub trait CartStorage: Send + Sync {
    /// Read the value under `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` when the medium cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` when the medium cannot be written.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the entry under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` when the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed storage: one JSON file per key under a data directory.
///
/// Writes go to a temporary file first and are moved into place, so a
/// crash mid-write leaves the previous state intact rather than a
/// truncated file.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CartStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl CartStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert!(storage.load(CART_KEY).unwrap().is_none());

        storage.save(CART_KEY, "[{\"x\":1}]").unwrap();
        assert_eq!(storage.load(CART_KEY).unwrap().as_deref(), Some("[{\"x\":1}]"));

        storage.save(CART_KEY, "[]").unwrap();
        assert_eq!(storage.load(CART_KEY).unwrap().as_deref(), Some("[]"));

        storage.remove(CART_KEY).unwrap();
        assert!(storage.load(CART_KEY).unwrap().is_none());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.remove("never-written").is_ok());
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::default();
        storage.save("k", "v").unwrap();
        assert_eq!(storage.load("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert!(storage.load("k").unwrap().is_none());
    }
}
