//! # Persistence Module
//!
//! Durable chunk storage on top of a [`KeyValueStore`].
//!
//! ## Key Components
//! - `ChunkPersistence`: known-key index, coalesced background loads, batched
//!   background saves
//! - `WorldMetadata`: the per-world record holding the generation seed
//! - `MemoryStore` / `DirectoryStore`: the two bundled backends
//!
//! ## Failure Policy
//!
//! Nothing in here fails loudly. A load that errors (or finds a record of the
//! wrong size) resolves as "not found" and the chunk is regenerated. A save
//! that errors is reported per key so the caller can leave that chunk dirty.

pub mod store;

use std::{
    collections::{HashMap, HashSet},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread,
};

use futures::{
    channel::oneshot,
    future::{BoxFuture, FutureExt, Shared},
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::{
    core::MtResource,
    engine_state::error::StorageError,
};

use super::chunk::{ChunkBuffer, ChunkDimensions, ChunkKey};

pub use store::{DirectoryStore, KeyValueStore, MemoryStore};

/// Store key of the world metadata record.
pub const METADATA_KEY: &str = "world_meta";

/// Outcome of a chunk load: the stored buffer, or `None` when the chunk must be generated.
pub type LoadResult = Option<Arc<ChunkBuffer>>;

/// A pending chunk load. Clones resolve to the same `Arc` buffer.
pub type ChunkLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Per-world record persisted next to the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMetadata {
    /// Seed the world's terrain is generated from.
    pub seed: u32,
}

/// One chunk to be written.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Chunk being saved.
    pub key: ChunkKey,
    /// Dirty revision the bytes were captured at.
    pub revision: u64,
    /// Buffer contents.
    pub bytes: Vec<u8>,
}

/// Result of writing one chunk.
#[derive(Debug)]
pub struct SaveOutcome {
    /// Chunk that was saved.
    pub key: ChunkKey,
    /// Dirty revision the saved bytes belong to.
    pub revision: u64,
    /// Whether the write succeeded.
    pub result: Result<(), StorageError>,
}

/// Chunk records in a key-value store.
///
/// `ChunkPersistence` lives on the owner thread. Loads and batched saves run on
/// short-lived background threads that share only the store, the known-key
/// index and the in-flight load table.
pub struct ChunkPersistence {
    /// Backend
    store: Arc<dyn KeyValueStore>,
    /// Expected record layout
    dims: ChunkDimensions,
    /// Keys known to exist in the store
    known: MtResource<HashSet<ChunkKey>>,
    /// Loads that have not resolved yet
    in_flight: MtResource<HashMap<ChunkKey, ChunkLoad>>,
    /// Keys of background saves that have not reported back
    saving: HashSet<ChunkKey>,
    /// Background saves report here
    save_tx: Sender<Vec<SaveOutcome>>,
    save_rx: Receiver<Vec<SaveOutcome>>,
}

impl ChunkPersistence {
    /// Creates persistence over `store` for chunks of the given layout.
    ///
    /// Call [`ChunkPersistence::init`] before use.
    pub fn new(store: Arc<dyn KeyValueStore>, dims: ChunkDimensions) -> Self {
        let (save_tx, save_rx) = channel();
        Self {
            store,
            dims,
            known: MtResource::default(),
            in_flight: MtResource::default(),
            saving: HashSet::new(),
            save_tx,
            save_rx,
        }
    }

    /// Initializes the store and loads the known-key index, once.
    ///
    /// # Returns
    /// Number of chunk records found.
    pub fn init(&self) -> Result<usize, StorageError> {
        let start = Instant::now();
        self.store.init()?;
        let keys: HashSet<ChunkKey> = self
            .store
            .list_keys()?
            .iter()
            .filter_map(|name| ChunkKey::from_storage_name(name))
            .collect();

        let count = keys.len();
        *self.known.get_mut() = keys;
        info!("indexed {} stored chunks in {:?}", count, start.elapsed());
        Ok(count)
    }

    /// Whether the index says `key` is stored. Never touches the store.
    pub fn has_chunk(&self, key: ChunkKey) -> bool {
        self.known.get().contains(&key)
    }

    /// Number of indexed chunk records.
    pub fn known_count(&self) -> usize {
        self.known.get().len()
    }

    /// Starts (or joins) the load of a chunk record.
    ///
    /// While a load for `key` is in flight every call returns a clone of the
    /// same future, so concurrent callers cause exactly one store read.
    pub fn load_chunk(&self, key: ChunkKey) -> ChunkLoad {
        let mut in_flight = self.in_flight.get_mut();
        if let Some(load) = in_flight.get(&key) {
            return load.clone();
        }

        let (tx, rx) = oneshot::channel::<LoadResult>();
        let load: ChunkLoad = rx.map(|result| result.unwrap_or(None)).boxed().shared();
        in_flight.insert(key, load.clone());
        drop(in_flight);

        let store = Arc::clone(&self.store);
        let table = self.in_flight.clone();
        let dims = self.dims;
        let spawned = thread::Builder::new()
            .name(format!("chunk-load-{}-{}", key.cx(), key.cz()))
            .spawn(move || {
                let result = read_chunk(store.as_ref(), dims, key);
                table.get_mut().remove(&key);
                // The receiver may be gone if every caller lost interest
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            // Dropping the closure dropped the sender, so the load resolves as "not found"
            error!("could not spawn load thread for chunk {}: {}", key, e);
            self.in_flight.get_mut().remove(&key);
        }
        load
    }

    /// Number of loads that have not resolved yet.
    pub fn loads_in_flight(&self) -> usize {
        self.in_flight.get().len()
    }

    /// Writes one chunk record on the calling thread and indexes it.
    pub fn save_chunk(&self, key: ChunkKey, bytes: &[u8]) -> Result<(), StorageError> {
        write_chunk(self.store.as_ref(), &self.known, key, bytes)
    }

    /// Submits a batch of chunks to be written on a background thread.
    ///
    /// Keys that already have a save in flight are skipped; their dirty flag
    /// stays set and a later batch picks them up.
    ///
    /// # Returns
    /// Number of chunks actually submitted.
    pub fn save_batch(&mut self, batch: Vec<SaveRequest>) -> usize {
        let batch: Vec<SaveRequest> = batch
            .into_iter()
            .filter(|request| !self.saving.contains(&request.key))
            .collect();
        if batch.is_empty() {
            return 0;
        }

        let keys: Vec<ChunkKey> = batch.iter().map(|request| request.key).collect();
        self.saving.extend(keys.iter().copied());

        let store = Arc::clone(&self.store);
        let known = self.known.clone();
        let reports = self.save_tx.clone();
        let count = batch.len();
        let spawned = thread::Builder::new()
            .name("chunk-save".to_string())
            .spawn(move || {
                let outcomes = write_batch(store.as_ref(), &known, batch);
                let _ = reports.send(outcomes);
            });

        match spawned {
            Ok(_) => count,
            Err(e) => {
                error!("could not spawn save thread for {} chunks: {}", count, e);
                for key in keys {
                    self.saving.remove(&key);
                }
                0
            }
        }
    }

    /// Writes a batch on the calling thread.
    pub fn save_batch_blocking(&mut self, batch: Vec<SaveRequest>) -> Vec<SaveOutcome> {
        write_batch(self.store.as_ref(), &self.known, batch)
    }

    /// Collects the reports of finished background saves without blocking.
    pub fn poll_saves(&mut self) -> Vec<SaveOutcome> {
        let mut finished = Vec::new();
        while let Ok(outcomes) = self.save_rx.try_recv() {
            finished.extend(outcomes);
        }
        for outcome in &finished {
            self.saving.remove(&outcome.key);
        }
        finished
    }

    /// Blocks until every background save has reported back.
    pub fn wait_for_saves(&mut self) -> Vec<SaveOutcome> {
        let mut finished = Vec::new();
        while !self.saving.is_empty() {
            // `save_tx` lives in `self`, so the channel never disconnects here
            let Ok(outcomes) = self.save_rx.recv() else {
                break;
            };
            for outcome in &outcomes {
                self.saving.remove(&outcome.key);
            }
            finished.extend(outcomes);
        }
        finished
    }

    /// Whether a background save of `key` has not reported back yet.
    pub fn is_saving(&self, key: ChunkKey) -> bool {
        self.saving.contains(&key)
    }

    /// Number of chunks in background saves that have not reported back.
    pub fn saves_in_flight(&self) -> usize {
        self.saving.len()
    }

    /// Deletes every record, including world metadata, and resets the index.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.wait_for_saves();
        self.store.clear()?;
        self.known.get_mut().clear();
        info!("chunk store cleared");
        Ok(())
    }

    /// Reads the world metadata record.
    pub fn load_metadata(&self) -> Result<Option<WorldMetadata>, StorageError> {
        match self.store.get(METADATA_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes the world metadata record.
    pub fn save_metadata(&self, metadata: &WorldMetadata) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(metadata)?;
        self.store.set(METADATA_KEY, &bytes)
    }
}

/// Reads and validates one chunk record, mapping every failure to "not found".
fn read_chunk(store: &dyn KeyValueStore, dims: ChunkDimensions, key: ChunkKey) -> LoadResult {
    let name = key.storage_name();
    let bytes = match store.get(&name) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("chunk {} indexed but not stored", key);
            return None;
        }
        Err(e) => {
            warn!("load of chunk {} failed, regenerating: {}", key, e);
            return None;
        }
    };

    let found = bytes.len();
    match ChunkBuffer::from_bytes(dims, bytes) {
        Some(buffer) => Some(Arc::new(buffer)),
        None => {
            let e = StorageError::CorruptRecord {
                key: name,
                expected: dims.volume(),
                found,
            };
            warn!("{}, regenerating", e);
            None
        }
    }
}

fn write_chunk(
    store: &dyn KeyValueStore,
    known: &MtResource<HashSet<ChunkKey>>,
    key: ChunkKey,
    bytes: &[u8],
) -> Result<(), StorageError> {
    store.set(&key.storage_name(), bytes)?;
    known.get_mut().insert(key);
    Ok(())
}

/// Writes every request, reporting each key separately. A panicking backend
/// fails the rest of the batch instead of losing the report.
fn write_batch(
    store: &dyn KeyValueStore,
    known: &MtResource<HashSet<ChunkKey>>,
    batch: Vec<SaveRequest>,
) -> Vec<SaveOutcome> {
    let start = Instant::now();
    let mut outcomes = Vec::with_capacity(batch.len());

    for request in batch {
        let result = catch_unwind(AssertUnwindSafe(|| {
            write_chunk(store, known, request.key, &request.bytes)
        }))
        .unwrap_or_else(|_| Err(StorageError::Unavailable("store panicked during write".to_string())));

        if let Err(e) = &result {
            error!("save of chunk {} failed, keeping it dirty: {}", request.key, e);
        }
        outcomes.push(SaveOutcome {
            key: request.key,
            revision: request.revision,
            result,
        });
    }

    debug!("saved {} chunks in {:?}", outcomes.len(), start.elapsed());
    outcomes
}
