//! Durable key-value backends
//!
//! The store writes two values, each under a fixed key. [`FileStorage`]
//! keeps one JSON file per key; [`MemoryStorage`] lives only as long as the
//! process.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{EngineConfig, StorageBackend};
use crate::error::StorageError;

/// Key-value storage the flow store writes through to
pub trait Storage: Send + Sync {
    /// Value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`; missing keys are fine
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::DirectoryCreationFailed {
            path: dir.display().to_string(),
            source: e,
        })?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        // Atomic replace through a sibling temp file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                source: e,
            })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed {
                key: key.to_string(),
                source: e,
            }),
        }
    }
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Build the backend named in `config`.
///
/// `None` means no durable storage is available; the store then keeps
/// everything in memory and skips writes.
pub fn open_storage(config: &EngineConfig) -> Option<Arc<dyn Storage>> {
    match config.storage {
        StorageBackend::File => match FileStorage::new(&config.storage_dir) {
            Ok(storage) => {
                tracing::debug!("Using file storage at {}", storage.dir().display());
                Some(Arc::new(storage))
            }
            Err(e) => {
                tracing::warn!("File storage unavailable, progress will not persist: {}", e);
                None
            }
        },
        StorageBackend::Memory => Some(Arc::new(MemoryStorage::new())),
        StorageBackend::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("store")).unwrap();

        assert_eq!(storage.get("progress").unwrap(), None);

        storage.set("progress", "[1,2]").unwrap();
        assert_eq!(storage.get("progress").unwrap().as_deref(), Some("[1,2]"));
        assert!(dir.path().join("store").join("progress.json").exists());

        storage.remove("progress").unwrap();
        assert_eq!(storage.get("progress").unwrap(), None);
        storage.remove("progress").unwrap();
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        assert!(matches!(storage.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));
        assert!(matches!(storage.get(".hidden"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(storage.len(), 1);

        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_open_storage_backends() {
        let dir = tempfile::tempdir().unwrap();

        let config = EngineConfig {
            storage_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        assert!(open_storage(&config).is_some());

        assert!(open_storage(&EngineConfig::in_memory()).is_some());

        let config = EngineConfig {
            storage: StorageBackend::None,
            ..EngineConfig::default()
        };
        assert!(open_storage(&config).is_none());
    }
}
