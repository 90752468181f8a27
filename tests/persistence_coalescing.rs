use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::{Condvar, Mutex};
use voxel_world_engine::engine_state::{
    error::StorageError,
    voxels::{
        chunk::{ChunkBuffer, ChunkDimensions, ChunkKey},
        persistence::{ChunkPersistence, KeyValueStore, MemoryStore, SaveRequest},
    },
};

/// A store whose reads block until the gate opens, counting each read.
struct GatedStore {
    inner: MemoryStore,
    open: Mutex<bool>,
    opened: Condvar,
    reads: AtomicUsize,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            open: Mutex::new(false),
            opened: Condvar::new(),
            reads: AtomicUsize::new(0),
        }
    }

    fn open_gate(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

impl KeyValueStore for GatedStore {
    fn init(&self) -> Result<(), StorageError> {
        self.inner.init()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        drop(open);
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.inner.set(key, value)
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_keys()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear()
    }
}

fn dims() -> ChunkDimensions {
    ChunkDimensions::new(16, 32)
}

#[test]
fn concurrent_loads_share_one_read() {
    let store = Arc::new(GatedStore::new());
    let key = ChunkKey::new(2, -5);
    let mut buffer = ChunkBuffer::empty(dims());
    buffer.set(3, 4, 5, 12);
    store.set(&key.storage_name(), buffer.as_bytes()).unwrap();

    let persistence = ChunkPersistence::new(store.clone(), dims());
    persistence.init().unwrap();

    let loads: Vec<_> = (0..8).map(|_| persistence.load_chunk(key)).collect();
    assert_eq!(persistence.loads_in_flight(), 1);
    store.open_gate();

    let results: Vec<_> = loads
        .into_iter()
        .map(|load| pollster::block_on(load).unwrap())
        .collect();

    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert_eq!(*results[0], buffer);
    assert!(results.iter().all(|result| Arc::ptr_eq(result, &results[0])));
}

#[test]
fn loads_after_completion_read_again() {
    let store = Arc::new(GatedStore::new());
    store.open_gate();
    let key = ChunkKey::new(0, 0);
    store
        .set(&key.storage_name(), ChunkBuffer::empty(dims()).as_bytes())
        .unwrap();

    let persistence = ChunkPersistence::new(store.clone(), dims());
    persistence.init().unwrap();

    assert!(pollster::block_on(persistence.load_chunk(key)).is_some());
    assert!(pollster::block_on(persistence.load_chunk(key)).is_some());
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn background_saves_report_each_chunk() {
    let store = Arc::new(MemoryStore::new());
    let mut persistence = ChunkPersistence::new(store.clone(), dims());
    persistence.init().unwrap();

    let batch = (0..3)
        .map(|cx| SaveRequest {
            key: ChunkKey::new(cx, 0),
            revision: cx as u64,
            bytes: ChunkBuffer::empty(dims()).into_bytes(),
        })
        .collect();
    assert_eq!(persistence.save_batch(batch), 3);

    let outcomes = persistence.wait_for_saves();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(persistence.known_count(), 3);
    assert_eq!(store.write_count(), 3);
}
