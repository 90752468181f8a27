//! # Key-Value Store Module
//!
//! The durable substrate under chunk persistence. A store maps string keys to
//! byte records; it knows nothing about chunks.
//!
//! Store methods block. `ChunkPersistence` only ever calls them from its own
//! background threads, or from the owner thread on the explicit blocking paths
//! (`init`, `flush`, `clear`).

use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use log::{debug, info};
use parking_lot::RwLock;

use crate::engine_state::error::StorageError;

/// A durable map from string keys to byte records.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Prepares the backend. Called once before any other operation.
    fn init(&self) -> Result<(), StorageError>;

    /// Reads a record.
    ///
    /// # Returns
    /// `Ok(None)` if the key has never been written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes (or overwrites) a record.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Every key currently stored.
    fn list_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Deletes every record.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory store for throw-away worlds and tests.
///
/// Counts reads and writes, and can be switched off to simulate a failing
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent operation fail with [`StorageError::Unavailable`]
    /// (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no record.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn init(&self) -> Result<(), StorageError> {
        self.check_available()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.records.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.records.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        Ok(self.records.read().keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.check_available()?;
        self.records.write().clear();
        Ok(())
    }
}

/// File extension of records written by [`DirectoryStore`].
const RECORD_EXTENSION: &str = "bin";

/// Store keeping one file per key under a root directory.
///
/// Writes go to a temporary file that is then renamed over the record, so a
/// crash mid-write never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`. Nothing touches the disk until [`KeyValueStore::init`].
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    fn io_error(&self, key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for DirectoryStore {
    fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| self.io_error(&self.root.display().to_string(), e))?;
        info!("chunk store ready at {}", self.root.display());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.record_path(key);
        let staging = self.root.join(format!("{}.{}.tmp", key, RECORD_EXTENSION));

        let mut file = fs::File::create(&staging).map_err(|e| self.io_error(key, e))?;
        file.write_all(value).map_err(|e| self.io_error(key, e))?;
        file.sync_all().map_err(|e| self.io_error(key, e))?;
        fs::rename(&staging, &path).map_err(|e| self.io_error(key, e))?;

        debug!("wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let root = self.root.display().to_string();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&root, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| self.io_error(&root, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        for key in self.list_keys()? {
            match fs::remove_file(self.record_path(&key)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error(&key, e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_counts_operations() {
        let store = MemoryStore::new();
        store.set("a", &[1, 2, 3]).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.read_count(), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn offline_memory_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.get("a"), Err(StorageError::Unavailable(_))));
        assert!(matches!(store.set("a", &[1]), Err(StorageError::Unavailable(_))));
        store.set_available(true);
        assert!(store.set("a", &[1]).is_ok());
    }

    #[test]
    fn directory_store_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("world"));
        store.init().unwrap();

        store.set("chunk_0_-1", &[7; 16]).unwrap();
        store.set("world_meta", b"{\"seed\":1}").unwrap();
        assert_eq!(store.get("chunk_0_-1").unwrap(), Some(vec![7; 16]));
        assert_eq!(store.get("chunk_9_9").unwrap(), None);

        let mut keys = store.list_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["chunk_0_-1".to_string(), "world_meta".to_string()]);

        store.clear().unwrap();
        assert!(store.list_keys().unwrap().is_empty());
    }

    #[test]
    fn directory_store_lists_nothing_before_init() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("missing"));
        assert!(store.list_keys().unwrap().is_empty());
    }
}
