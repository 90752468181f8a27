//! # Chunk Generation Queue
//!
//! Resolves missing chunks, nearest first. Each pending key moves through
//!
//! ```text
//! queued -> loading (stored record) -> ready
//!        \-> generating (worker or owner thread) -> ready
//! ```
//!
//! and leaves the pending set only when [`ChunkGenerationQueue::process`]
//! hands its finished buffer back to the caller. A key is never pending twice.
//!
//! Cancelling a key (its chunk left the active area) only forgets it. Work
//! already running for it finishes and is discarded on arrival.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use futures::FutureExt;
use log::{debug, warn};

use crate::engine_state::task_management::{task::TaskOutcome, TaskManager};

use super::{
    chunk::{ChunkBuffer, ChunkKey},
    generation::WorldGenerator,
    persistence::{ChunkLoad, ChunkPersistence},
    tasks::ChunkGenerationTask,
};

/// Where a resolved buffer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// Read back from the store.
    Stored,
    /// Freshly generated; it has never been saved.
    Generated,
}

/// A finished chunk, ready to be stored in the data manager and meshed.
#[derive(Debug)]
pub struct ResolvedChunk {
    /// Chunk the buffer belongs to
    pub key: ChunkKey,
    /// Its blocks
    pub buffer: ChunkBuffer,
    /// Whether it was loaded or generated
    pub source: ChunkSource,
}

/// Heap entry. Lower priority values pop first; ties pop in enqueue order.
#[derive(Debug, Clone, Copy)]
struct QueuedChunk {
    priority: i32,
    seq: u64,
    key: ChunkKey,
}

impl PartialEq for QueuedChunk {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedChunk {}

impl PartialOrd for QueuedChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum PendingState {
    /// Waiting in the heap under this sequence number
    Queued(u64),
    /// Stored record being read
    Loading(ChunkLoad),
    /// Submitted to a worker for this seed
    Generating(u32),
}

/// Priority queue of chunks waiting for a buffer.
pub struct ChunkGenerationQueue {
    heap: BinaryHeap<QueuedChunk>,
    pending: HashMap<ChunkKey, PendingState>,
    next_seq: u64,
    tasks: TaskManager<ChunkGenerationTask>,
    /// Worker results not handed out yet
    finished: VecDeque<TaskOutcome<ChunkGenerationTask>>,
    /// Tasks stranded on a queue with no live worker, run on the owner thread
    fallback: VecDeque<ChunkGenerationTask>,
}

impl ChunkGenerationQueue {
    /// Creates a queue backed by `worker_count` generation threads.
    ///
    /// With zero workers every chunk is generated synchronously inside
    /// [`process`](Self::process).
    pub fn new(worker_count: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
            tasks: TaskManager::new(worker_count),
            finished: VecDeque::new(),
            fallback: VecDeque::new(),
        }
    }

    /// Number of live generation workers.
    pub fn worker_count(&self) -> usize {
        self.tasks.worker_count()
    }

    /// Adds a chunk to the queue unless it is already pending.
    ///
    /// # Arguments
    /// * `key` - Chunk to resolve
    /// * `priority` - Lower values are resolved sooner
    ///
    /// # Returns
    /// `true` if the key was not pending before.
    pub fn enqueue(&mut self, key: ChunkKey, priority: i32) -> bool {
        if self.pending.contains_key(&key) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.pending.insert(key, PendingState::Queued(seq));
        self.heap.push(QueuedChunk { priority, seq, key });
        true
    }

    /// Whether `key` is waiting for a buffer.
    pub fn is_pending(&self, key: ChunkKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Number of pending keys.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending keys, in no particular order.
    pub fn pending_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.pending.keys().copied()
    }

    /// Forgets a pending key. Whatever is still running for it is discarded
    /// when it finishes.
    ///
    /// # Returns
    /// `true` if the key was pending.
    pub fn cancel(&mut self, key: ChunkKey) -> bool {
        self.pending.remove(&key).is_some()
    }

    /// Forgets every pending key and queued task.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
        self.finished.clear();
        self.fallback.clear();
        self.tasks.drain_queued();
    }

    /// Advances the queue by at most one finished chunk.
    ///
    /// Finished worker results are handed out before stored records, and both
    /// before new work is started. Starting loads and worker tasks does not
    /// count as finished work, so several may start in one call; generating on
    /// the owner thread does, and ends the call.
    ///
    /// # Arguments
    /// * `persistence` - Source of stored chunk records
    /// * `generator` - Used for synchronous generation; its seed tags worker tasks
    ///
    /// # Returns
    /// The chunk that finished during this call, if any.
    pub fn process(
        &mut self,
        persistence: &ChunkPersistence,
        generator: &WorldGenerator,
    ) -> Option<ResolvedChunk> {
        self.collect_worker_results(generator);

        if let Some(resolved) = self.take_finished(generator) {
            return Some(resolved);
        }

        if let Some(resolved) = self.take_loaded(generator) {
            return Some(resolved);
        }

        if let Some(task) = self.fallback.pop_front() {
            return self.generate_now(task.key(), generator);
        }

        self.start_work(persistence, generator)
    }

    /// Produces the buffer of `key` on the calling thread, blocking on a
    /// stored read if there is one. Any pending work for the key is dropped.
    pub fn resolve_blocking(
        &mut self,
        key: ChunkKey,
        persistence: &ChunkPersistence,
        generator: &WorldGenerator,
    ) -> ResolvedChunk {
        let state = self.pending.remove(&key);

        let load = match state {
            Some(PendingState::Loading(load)) => Some(load),
            _ if persistence.has_chunk(key) => Some(persistence.load_chunk(key)),
            _ => None,
        };

        if let Some(buffer) = load.and_then(|load| pollster::block_on(load)) {
            return ResolvedChunk {
                key,
                buffer: unwrap_shared(buffer),
                source: ChunkSource::Stored,
            };
        }

        ResolvedChunk {
            key,
            buffer: generator.generate_chunk(key),
            source: ChunkSource::Generated,
        }
    }

    fn collect_worker_results(&mut self, generator: &WorldGenerator) {
        let live_workers = self.tasks.worker_count();
        self.tasks.process_queued_tasks();
        self.finished.extend(self.tasks.poll_completed());

        // Tasks in flight on a lost worker never come back.
        if self.tasks.worker_count() < live_workers {
            let returned: HashSet<ChunkKey> =
                self.finished.iter().map(|outcome| outcome.task.key()).collect();
            let stranded: Vec<ChunkKey> = self
                .pending
                .iter()
                .filter(|(key, state)| {
                    matches!(state, PendingState::Generating(_)) && !returned.contains(key)
                })
                .map(|(key, _)| *key)
                .collect();
            if !stranded.is_empty() {
                warn!("resubmitting {} chunks after losing a worker", stranded.len());
            }
            for key in stranded {
                self.submit(key, generator);
            }
        }

        // Every worker is gone; nothing queued on the manager will ever run.
        if self.tasks.worker_count() == 0 {
            self.fallback.extend(self.tasks.drain_queued());
        }
    }

    fn take_finished(&mut self, generator: &WorldGenerator) -> Option<ResolvedChunk> {
        while let Some(outcome) = self.finished.pop_front() {
            let key = outcome.task.key();
            let seed = match self.pending.get(&key) {
                Some(PendingState::Generating(seed)) => *seed,
                _ => {
                    debug!("discarding generated chunk {}, no longer pending", key);
                    continue;
                }
            };
            if seed != generator.seed() || outcome.task.seed != seed {
                self.submit(key, generator);
                continue;
            }

            self.pending.remove(&key);
            return Some(ResolvedChunk {
                key,
                buffer: outcome.into_output_or_rerun(),
                source: ChunkSource::Generated,
            });
        }
        None
    }

    fn take_loaded(&mut self, generator: &WorldGenerator) -> Option<ResolvedChunk> {
        let ready: Vec<(ChunkKey, Option<Arc<ChunkBuffer>>)> = self
            .pending
            .iter()
            .filter_map(|(key, state)| match state {
                PendingState::Loading(load) => load.clone().now_or_never().map(|result| (*key, result)),
                _ => None,
            })
            .collect();

        let mut resolved = None;
        for (key, result) in ready {
            match result {
                Some(buffer) if resolved.is_none() => {
                    self.pending.remove(&key);
                    resolved = Some(ResolvedChunk {
                        key,
                        buffer: unwrap_shared(buffer),
                        source: ChunkSource::Stored,
                    });
                }
                // Picked up by a later call
                Some(_) => {}
                None => {
                    debug!("chunk {} not found in store, generating", key);
                    self.submit(key, generator);
                }
            }
        }
        resolved
    }

    fn start_work(
        &mut self,
        persistence: &ChunkPersistence,
        generator: &WorldGenerator,
    ) -> Option<ResolvedChunk> {
        let mut budget = self.tasks.worker_count().max(1);

        while budget > 0 {
            let entry = self.heap.pop()?;
            match self.pending.get(&entry.key) {
                Some(PendingState::Queued(seq)) if *seq == entry.seq => {}
                // Cancelled or re-enqueued since this entry was pushed
                _ => continue,
            }
            budget -= 1;

            if persistence.has_chunk(entry.key) {
                let load = persistence.load_chunk(entry.key);
                self.pending
                    .insert(entry.key, PendingState::Loading(load));
                continue;
            }

            if self.tasks.worker_count() == 0 {
                return self.generate_now(entry.key, generator);
            }
            self.submit(entry.key, generator);
        }
        None
    }

    /// Hands generation of `key` to a worker, or to the owner thread when no
    /// worker is left.
    fn submit(&mut self, key: ChunkKey, generator: &WorldGenerator) {
        let task = ChunkGenerationTask::new(generator.seed(), key, generator.dims());
        self.pending
            .insert(key, PendingState::Generating(generator.seed()));
        if self.tasks.worker_count() == 0 {
            self.fallback.push_back(task);
        } else {
            self.tasks.publish_task(task);
        }
    }

    fn generate_now(&mut self, key: ChunkKey, generator: &WorldGenerator) -> Option<ResolvedChunk> {
        if self.pending.remove(&key).is_none() {
            return None;
        }
        if self.tasks.worker_count() > 0 {
            warn!("generating chunk {} on the owner thread", key);
        }
        Some(ResolvedChunk {
            key,
            buffer: generator.generate_chunk(key),
            source: ChunkSource::Generated,
        })
    }
}

/// Takes the buffer out of a shared load result, copying it only when another
/// caller still holds it.
fn unwrap_shared(buffer: Arc<ChunkBuffer>) -> ChunkBuffer {
    Arc::try_unwrap(buffer).unwrap_or_else(|shared| (*shared).clone())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine_state::voxels::{
        chunk::ChunkDimensions,
        persistence::{KeyValueStore, MemoryStore},
    };

    fn setup() -> (ChunkPersistence, WorldGenerator, Arc<MemoryStore>) {
        let dims = ChunkDimensions::new(16, 64);
        let store = Arc::new(MemoryStore::new());
        let persistence = ChunkPersistence::new(store.clone(), dims);
        persistence.init().unwrap();
        (persistence, WorldGenerator::new(42, dims), store)
    }

    fn process_until_resolved(
        queue: &mut ChunkGenerationQueue,
        persistence: &ChunkPersistence,
        generator: &WorldGenerator,
    ) -> ResolvedChunk {
        for _ in 0..1000 {
            if let Some(resolved) = queue.process(persistence, generator) {
                return resolved;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("queue never resolved a chunk");
    }

    #[test]
    fn enqueue_deduplicates_pending_keys() {
        let mut queue = ChunkGenerationQueue::new(0);
        assert!(queue.enqueue(ChunkKey::new(1, 1), 3));
        assert!(!queue.enqueue(ChunkKey::new(1, 1), 0));
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn synchronous_queue_resolves_nearest_first() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(0);
        queue.enqueue(ChunkKey::new(5, 5), 5);
        queue.enqueue(ChunkKey::new(0, 1), 1);

        let first = queue.process(&persistence, &generator).unwrap();
        assert_eq!(first.key, ChunkKey::new(0, 1));
        assert_eq!(first.source, ChunkSource::Generated);
        assert!(!queue.is_pending(first.key));
        assert_eq!(first.buffer, generator.generate_chunk(first.key));

        let second = queue.process(&persistence, &generator).unwrap();
        assert_eq!(second.key, ChunkKey::new(5, 5));
        assert!(queue.process(&persistence, &generator).is_none());
    }

    #[test]
    fn worker_generation_matches_synchronous_generation() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(2);
        let key = ChunkKey::new(-3, 7);
        queue.enqueue(key, 0);

        let resolved = process_until_resolved(&mut queue, &persistence, &generator);
        assert_eq!(resolved.key, key);
        assert_eq!(resolved.buffer, generator.generate_chunk(key));
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn stored_chunks_are_loaded_instead_of_generated() {
        let (persistence, generator, store) = setup();
        let key = ChunkKey::new(2, 2);
        let mut edited = generator.generate_chunk(key);
        edited.set(0, 10, 0, 0);
        persistence.save_chunk(key, edited.as_bytes()).unwrap();

        let mut queue = ChunkGenerationQueue::new(0);
        queue.enqueue(key, 0);
        let resolved = process_until_resolved(&mut queue, &persistence, &generator);

        assert_eq!(resolved.source, ChunkSource::Stored);
        assert_eq!(resolved.buffer, edited);
        assert_eq!(store.read_count(), 1);
        assert!(store.list_keys().unwrap().contains(&key.storage_name()));
    }

    #[test]
    fn cancelled_keys_are_discarded() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(1);
        let key = ChunkKey::new(0, 0);
        queue.enqueue(key, 0);
        assert!(queue.process(&persistence, &generator).is_none());
        assert!(queue.cancel(key));

        for _ in 0..50 {
            assert!(queue.process(&persistence, &generator).is_none());
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!queue.is_pending(key));
    }

    #[test]
    fn blocking_resolution_takes_over_pending_work() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(1);
        let key = ChunkKey::new(4, -4);
        queue.enqueue(key, 0);
        queue.process(&persistence, &generator);

        let resolved = queue.resolve_blocking(key, &persistence, &generator);
        assert_eq!(resolved.key, key);
        assert!(!queue.is_pending(key));
    }

    #[test]
    fn lost_worker_switches_to_owner_thread_generation() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(1);
        queue.tasks.disconnect_worker(0);
        let key = ChunkKey::new(4, -2);
        queue.enqueue(key, 0);

        let resolved = process_until_resolved(&mut queue, &persistence, &generator);
        assert_eq!(resolved.key, key);
        assert_eq!(resolved.source, ChunkSource::Generated);
        assert_eq!(resolved.buffer, generator.generate_chunk(key));
        assert_eq!(queue.worker_count(), 0);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn work_stranded_on_a_dead_worker_falls_back() {
        let (persistence, generator, _) = setup();
        let mut queue = ChunkGenerationQueue::new(1);
        let in_flight = ChunkKey::new(0, 0);
        let backlogged = ChunkKey::new(1, 0);
        queue.enqueue(in_flight, 0);
        assert!(queue.process(&persistence, &generator).is_none());
        // The only worker is busy, so this one waits in the manager's backlog
        queue.submit(backlogged, &generator);
        assert_eq!(queue.tasks.queued_len(), 1);

        queue.tasks.disconnect_worker(0);

        let mut resolved = Vec::new();
        for _ in 0..10 {
            if let Some(chunk) = queue.process(&persistence, &generator) {
                resolved.push(chunk);
            }
        }
        resolved.sort_by_key(|chunk| chunk.key.cx());
        let keys: Vec<ChunkKey> = resolved.iter().map(|chunk| chunk.key).collect();
        assert_eq!(keys, vec![in_flight, backlogged]);
        for chunk in &resolved {
            assert_eq!(chunk.buffer, generator.generate_chunk(chunk.key));
        }
        assert_eq!(queue.worker_count(), 0);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.tasks.queued_len(), 0);
    }
}
