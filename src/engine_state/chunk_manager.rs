//! # Chunk Manager
//!
//! The facade collaborators talk to. It owns every chunk subsystem and is
//! driven once per frame from a single owner thread:
//!
//! 1. Finished background saves clear the dirty flags they cover
//! 2. Every chunk in the active square around the viewer that is neither
//!    resident nor pending is enqueued, nearest first
//! 3. Chunks outside the square lose their mesh; pending ones are cancelled
//! 4. The generation queue advances by at most one finished chunk, which is
//!    stored, meshed, and schedules its meshed neighbors for a rebuild
//! 5. A bounded number of scheduled neighbor rebuilds run
//! 6. Occasionally, far away clean buffers are evicted
//! 7. Dirty chunks are saved in the background on the autosave interval
//!
//! Block edits rebuild the edited chunk, plus the neighbors whose border the
//! edit touches, before returning.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use cgmath::Point3;
use log::{debug, error, info, warn};
use web_time::Instant;

use super::{
    camera_state::Viewer,
    config::WorldConfig,
    error::ConfigError,
    rendering::{
        meshing::{ChunkMesh, ChunkMeshManager, MeshCommand},
        texture_atlas::TextureAtlas,
        visibility::ChunkVisibility,
    },
    voxels::{
        block::BlockTypeSize,
        block_entity::BlockEntityStore,
        chunk::{ChunkDimensions, ChunkKey},
        chunk_data::ChunkDataManager,
        generation::WorldGenerator,
        generation_queue::{ChunkGenerationQueue, ChunkSource, ResolvedChunk},
        persistence::{ChunkPersistence, KeyValueStore, SaveOutcome, SaveRequest, WorldMetadata},
    },
};

/// Chunk totals for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkCount {
    /// Chunks found visible by the latest visibility pass
    pub visible: usize,
    /// Resident chunk buffers
    pub total: usize,
}

/// Streams, edits, persists and meshes the chunks around a viewer.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use cgmath::Point3;
/// use voxel_world_engine::engine_state::{
///     chunk_manager::ChunkManager,
///     config::WorldConfig,
///     voxels::{block_entity::NoBlockEntities, persistence::MemoryStore},
/// };
///
/// let config = WorldConfig {
///     seed: Some(42),
///     render_distance: 1,
///     worker_count: Some(0),
///     ..WorldConfig::default()
/// };
/// let mut world =
///     ChunkManager::open(config, Arc::new(MemoryStore::new()), Box::new(NoBlockEntities)).unwrap();
///
/// world.wait_for_chunk(0, 0);
/// let ground = world.get_top_y(3, 3);
/// assert!(world.has_block(3, ground, 3));
///
/// world.update(Point3::new(3.0, ground as f32 + 2.0, 3.0));
/// ```
pub struct ChunkManager {
    config: WorldConfig,
    dims: ChunkDimensions,
    generator: WorldGenerator,
    data: ChunkDataManager,
    persistence: ChunkPersistence,
    queue: ChunkGenerationQueue,
    meshes: ChunkMeshManager,
    visibility: ChunkVisibility,
    entities: Box<dyn BlockEntityStore + Send + Sync>,
    /// Chunk the viewer stood in during the last update
    viewer_chunk: Option<ChunkKey>,
    /// Meshed chunks, nearest first
    render_order: Vec<ChunkKey>,
    render_order_stale: bool,
    /// Meshed chunks waiting for a rebuild because a neighbor arrived
    remesh_backlog: VecDeque<ChunkKey>,
    /// Chunks asked for through `load_chunk`, kept pending outside the active square
    requested: HashSet<ChunkKey>,
    last_autosave: Instant,
    rng: fastrand::Rng,
}

impl ChunkManager {
    /// Opens the world stored in `store`.
    ///
    /// The seed comes from the store's metadata record when there is one.
    /// Otherwise the configured seed (or a random one) is used and recorded.
    /// A store that fails to initialize is logged and treated as empty.
    ///
    /// # Arguments
    /// * `config` - Engine tunables, validated before anything is opened
    /// * `store` - Durable key-value backend
    /// * `entities` - Block entity collaborator consulted by the mesh builder
    ///
    /// # Returns
    /// The world, or the first configuration field out of range.
    pub fn open(
        config: WorldConfig,
        store: Arc<dyn KeyValueStore>,
        entities: Box<dyn BlockEntityStore + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let dims = ChunkDimensions::new(config.chunk_size, config.chunk_height);
        let persistence = ChunkPersistence::new(store, dims);
        if let Err(e) = persistence.init() {
            error!("chunk store failed to initialize, starting empty: {}", e);
        }

        let seed = match persistence.load_metadata() {
            Ok(Some(metadata)) => {
                info!("opened world with stored seed {}", metadata.seed);
                metadata.seed
            }
            Ok(None) => {
                let seed = config.seed.unwrap_or_else(|| fastrand::u32(..));
                info!("new world with seed {}", seed);
                store_seed(&persistence, seed);
                seed
            }
            Err(e) => {
                warn!("world metadata unreadable, not overwriting it: {}", e);
                config.seed.unwrap_or_else(|| fastrand::u32(..))
            }
        };

        let worker_count = config.resolved_worker_count();
        let atlas = Arc::new(TextureAtlas::new(config.atlas));

        Ok(Self {
            dims,
            generator: WorldGenerator::new(seed, dims),
            data: ChunkDataManager::new(dims),
            persistence,
            queue: ChunkGenerationQueue::new(worker_count),
            meshes: ChunkMeshManager::new(atlas, config.mesh_capacity),
            visibility: ChunkVisibility::new(dims, config.rotation_threshold, config.movement_threshold),
            entities,
            viewer_chunk: None,
            render_order: Vec::new(),
            render_order_stale: false,
            remesh_backlog: VecDeque::new(),
            requested: HashSet::new(),
            last_autosave: Instant::now(),
            rng: fastrand::Rng::new(),
            config,
        })
    }

    /// Engine tunables this world was opened with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Chunk layout.
    pub fn dims(&self) -> ChunkDimensions {
        self.dims
    }

    /// Advances streaming by one frame.
    ///
    /// # Arguments
    /// * `viewer_position` - World-space position the active square is centered on
    pub fn update(&mut self, viewer_position: Point3<f32>) {
        let outcomes = self.persistence.poll_saves();
        self.apply_save_outcomes(outcomes);

        let center = self.dims.key_at(
            viewer_position.x.floor() as i32,
            viewer_position.z.floor() as i32,
        );
        let radius = self.config.active_radius();

        if self.viewer_chunk != Some(center) {
            self.viewer_chunk = Some(center);
            self.render_order_stale = true;
        }

        self.enqueue_active_square(center, radius);
        self.unload_outside(center, radius);

        if let Some(resolved) = self.queue.process(&self.persistence, &self.generator) {
            self.requested.remove(&resolved.key);
            self.accept(resolved);
        }

        self.drain_remesh_backlog(center, radius);

        if self.rng.f64() < self.config.eviction_probability {
            self.evict(center);
        }

        if self.render_order_stale {
            self.rebuild_render_order(center);
        }

        let interval = self.config.autosave_interval_secs;
        if interval > 0 && self.last_autosave.elapsed() >= Duration::from_secs(interval) {
            self.last_autosave = Instant::now();
            let submitted = self.save_dirty_chunks();
            if submitted > 0 {
                debug!("autosave submitted {} chunks", submitted);
            }
        }
    }

    /// Runs a visibility pass if the viewer turned or moved enough.
    ///
    /// # Returns
    /// `true` if the visible set was recomputed.
    pub fn update_visibility(&mut self, viewer: &dyn Viewer) -> bool {
        self.visibility.update(viewer, self.meshes.keys())
    }

    /// Whether chunk `(cx, cz)` intersects the latest frustum.
    pub fn is_chunk_visible(&self, cx: i32, cz: i32) -> bool {
        self.visibility.is_chunk_visible(ChunkKey::new(cx, cz))
    }

    /// Asks for chunk `(cx, cz)` ahead of everything else in the queue. It
    /// stays pending even outside the active square until it resolves.
    ///
    /// # Returns
    /// `false` if the chunk is already resident or pending.
    pub fn load_chunk(&mut self, cx: i32, cz: i32) -> bool {
        let key = ChunkKey::new(cx, cz);
        if self.data.contains(key) {
            return false;
        }
        let enqueued = self.queue.enqueue(key, i32::MIN);
        if enqueued {
            self.requested.insert(key);
        }
        enqueued
    }

    /// Makes chunk `(cx, cz)` resident before returning, loading or
    /// generating it on the calling thread if needed.
    pub fn wait_for_chunk(&mut self, cx: i32, cz: i32) {
        let key = ChunkKey::new(cx, cz);
        if self.data.contains(key) {
            return;
        }
        let resolved = self
            .queue
            .resolve_blocking(key, &self.persistence, &self.generator);
        self.requested.remove(&key);
        self.accept(resolved);
    }

    /// Block id at a world coordinate; air outside the world or in unloaded chunks.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockTypeSize {
        self.data.get_block(x, y, z)
    }

    /// Whether a world coordinate holds a non-air block.
    pub fn has_block(&self, x: i32, y: i32, z: i32) -> bool {
        self.data.has_block(x, y, z)
    }

    /// Writes a block and rebuilds every mesh that shows it.
    ///
    /// Writes to unloaded chunks or outside the world are ignored. Bedrock is
    /// not protected here; gameplay code checks
    /// [`BlockType::is_breakable`](super::voxels::block::block_type::BlockType::is_breakable)
    /// before removing blocks.
    ///
    /// # Returns
    /// `true` if the block was written.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockTypeSize) -> bool {
        if self.data.set_block(x, y, z, id).is_none() {
            return false;
        }
        for key in self.data.affected_chunk_keys(x, z) {
            if self.data.contains(key) {
                self.meshes.rebuild(&self.data, key, self.entities.as_ref());
            }
        }
        true
    }

    /// Highest solid block of a column, or the terrain height when the column
    /// is not loaded.
    pub fn get_top_y(&self, x: i32, z: i32) -> i32 {
        self.data.top_y(x, z, self.generator.terrain())
    }

    /// Whether the chunk containing world column `(x, z)` is resident.
    pub fn is_chunk_loaded(&self, x: i32, z: i32) -> bool {
        self.data.is_chunk_loaded(x, z)
    }

    /// Whether chunk `(cx, cz)` has edits that are not saved yet.
    pub fn is_dirty(&self, cx: i32, cz: i32) -> bool {
        self.data.is_dirty(ChunkKey::new(cx, cz))
    }

    /// Number of chunks with unsaved edits.
    pub fn dirty_count(&self) -> usize {
        self.data.dirty_count()
    }

    /// Number of chunks waiting in the generation queue.
    pub fn pending_count(&self) -> usize {
        self.queue.pending_len()
    }

    /// Submits every dirty chunk to a background save.
    ///
    /// Each chunk stays dirty until its save reports success and only if it
    /// was not edited again in the meantime.
    ///
    /// # Returns
    /// Number of chunks submitted.
    pub fn save_dirty_chunks(&mut self) -> usize {
        let batch = self.collect_dirty();
        self.persistence.save_batch(batch)
    }

    /// Saves every dirty chunk on the calling thread, after waiting for
    /// background saves. Used on shutdown.
    ///
    /// # Returns
    /// Number of chunks written successfully.
    pub fn flush(&mut self) -> usize {
        let outcomes = self.persistence.wait_for_saves();
        self.apply_save_outcomes(outcomes);

        let batch = self.collect_dirty();
        if batch.is_empty() {
            return 0;
        }
        let outcomes = self.persistence.save_batch_blocking(batch);
        let saved = self.apply_save_outcomes(outcomes);
        info!("flushed {} chunks", saved);
        saved
    }

    /// Deletes every stored and resident chunk and starts over with a new seed.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.meshes.clear();
        self.data.clear();
        self.visibility.clear();
        self.remesh_backlog.clear();
        self.requested.clear();
        self.render_order.clear();
        self.viewer_chunk = None;

        if let Err(e) = self.persistence.clear() {
            error!("could not clear chunk store: {}", e);
        }

        let seed = self.config.seed.unwrap_or_else(|| self.rng.u32(..));
        self.generator.set_seed(seed);
        store_seed(&self.persistence, seed);
        info!("world cleared, new seed {}", seed);
    }

    /// Generation seed.
    pub fn get_seed(&self) -> u32 {
        self.generator.seed()
    }

    /// Changes the generation seed and records it.
    ///
    /// Resident chunks are kept. Pending chunks are dropped and re-enqueued
    /// by the next update, so they are generated from the new seed.
    pub fn set_seed(&mut self, seed: u32) {
        self.generator.set_seed(seed);
        self.queue.clear();
        self.requested.clear();
        store_seed(&self.persistence, seed);
        info!("seed set to {}", seed);
    }

    /// Visible and resident chunk totals.
    pub fn get_chunk_count(&self) -> ChunkCount {
        ChunkCount {
            visible: self.visibility.visible_count(),
            total: self.data.len(),
        }
    }

    /// Meshed chunks, nearest to the viewer first.
    pub fn render_order(&self) -> &[ChunkKey] {
        &self.render_order
    }

    /// Mesh of chunk `key`.
    pub fn mesh(&self, key: ChunkKey) -> Option<&ChunkMesh> {
        self.meshes.mesh(key)
    }

    /// Mesh uploads and releases since the last call.
    pub fn drain_mesh_commands(&mut self) -> Vec<MeshCommand> {
        self.meshes.drain_commands()
    }

    /// Evicts up to `eviction_batch` of the farthest clean buffers once more
    /// than `max_resident_chunks` are resident. Normally run at random from
    /// [`update`](Self::update).
    ///
    /// # Returns
    /// Number of buffers evicted.
    pub fn evict_now(&mut self) -> usize {
        match self.viewer_chunk {
            Some(center) => self.evict(center),
            None => self.evict(ChunkKey::new(0, 0)),
        }
    }

    fn enqueue_active_square(&mut self, center: ChunkKey, radius: i32) {
        let (cx, cz) = center.coords();
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let key = ChunkKey::new(cx + dx, cz + dz);
                if self.data.contains(key) {
                    if !self.meshes.has_mesh(key) {
                        self.schedule_remesh(key);
                    }
                    continue;
                }
                self.queue.enqueue(key, dx.abs().max(dz.abs()));
            }
        }
    }

    fn accept(&mut self, resolved: ResolvedChunk) {
        let ResolvedChunk { key, buffer, source } = resolved;
        self.data.insert(key, buffer);
        if source == ChunkSource::Generated {
            self.data.mark_dirty(key);
        }

        self.visibility.chunk_loaded(key);
        self.meshes.rebuild(&self.data, key, self.entities.as_ref());
        self.render_order_stale = true;

        for neighbor in key.neighbors() {
            if self.meshes.has_mesh(neighbor) {
                self.schedule_remesh(neighbor);
            }
        }
    }

    fn schedule_remesh(&mut self, key: ChunkKey) {
        if !self.remesh_backlog.contains(&key) {
            self.remesh_backlog.push_back(key);
        }
    }

    fn drain_remesh_backlog(&mut self, center: ChunkKey, radius: i32) {
        let mut budget = self.config.neighbor_remesh_per_update;
        while budget > 0 {
            let Some(key) = self.remesh_backlog.pop_front() else {
                break;
            };
            if key.chebyshev_distance(center) > radius || !self.data.contains(key) {
                continue;
            }
            if !self.meshes.has_mesh(key) {
                self.visibility.chunk_loaded(key);
                self.render_order_stale = true;
            }
            self.meshes.rebuild(&self.data, key, self.entities.as_ref());
            budget -= 1;
        }
    }

    fn unload_outside(&mut self, center: ChunkKey, radius: i32) {
        let outside: Vec<ChunkKey> = self
            .meshes
            .keys()
            .filter(|key| key.chebyshev_distance(center) > radius)
            .collect();
        for key in &outside {
            self.meshes.unload(*key);
            self.visibility.clear_bounds(*key);
        }
        if !outside.is_empty() {
            self.render_order_stale = true;
        }

        let stale: Vec<ChunkKey> = self
            .queue
            .pending_keys()
            .filter(|key| key.chebyshev_distance(center) > radius && !self.requested.contains(key))
            .collect();
        for key in stale {
            self.queue.cancel(key);
        }
    }

    fn evict(&mut self, center: ChunkKey) -> usize {
        let resident = self.data.len();
        let cap = self.config.max_resident_chunks;
        if resident <= cap {
            return 0;
        }

        let radius = self.config.active_radius();
        let mut candidates: Vec<ChunkKey> = self
            .data
            .keys()
            .filter(|key| key.chebyshev_distance(center) > radius)
            .collect();
        candidates.sort_by_key(|key| std::cmp::Reverse(key.chebyshev_distance(center)));

        let wanted = self.config.eviction_batch;
        let mut evicted = 0;
        let mut blocked = 0;
        for key in candidates {
            if evicted == wanted {
                break;
            }
            if self.data.is_dirty(key) {
                blocked += 1;
                continue;
            }
            self.data.remove(key);
            self.meshes.unload(key);
            self.visibility.clear_bounds(key);
            evicted += 1;
        }

        if blocked > 0 {
            debug!("{} dirty chunks held back from eviction, saving them", blocked);
            self.save_dirty_chunks();
        }
        debug!("evicted {} of {} resident chunks", evicted, resident);
        evicted
    }

    fn rebuild_render_order(&mut self, center: ChunkKey) {
        let mut order: Vec<ChunkKey> = self.meshes.keys().collect();
        order.sort_by_key(|key| {
            let (dx, dz) = (key.cx() - center.cx(), key.cz() - center.cz());
            (dx as i64 * dx as i64 + dz as i64 * dz as i64, *key)
        });
        self.render_order = order;
        self.render_order_stale = false;
    }

    fn collect_dirty(&self) -> Vec<SaveRequest> {
        self.data
            .dirty_revisions()
            .filter_map(|(key, revision)| {
                self.data.buffer(key).map(|buffer| SaveRequest {
                    key,
                    revision,
                    bytes: buffer.as_bytes().to_vec(),
                })
            })
            .collect()
    }

    /// Clears the dirty flags covered by successful saves.
    ///
    /// # Returns
    /// Number of successful saves.
    fn apply_save_outcomes(&mut self, outcomes: Vec<SaveOutcome>) -> usize {
        let mut saved = 0;
        let mut edited: HashSet<ChunkKey> = HashSet::new();
        for outcome in outcomes {
            if outcome.result.is_err() {
                continue;
            }
            saved += 1;
            if !self.data.mark_saved(outcome.key, outcome.revision) {
                edited.insert(outcome.key);
            }
        }
        if !edited.is_empty() {
            debug!("{} chunks were edited while saving and stay dirty", edited.len());
        }
        saved
    }
}

fn store_seed(persistence: &ChunkPersistence, seed: u32) {
    if let Err(e) = persistence.save_metadata(&WorldMetadata { seed }) {
        error!("could not record world seed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{
        block::block_type::BlockType, block_entity::NoBlockEntities, persistence::MemoryStore,
    };

    fn small_config() -> WorldConfig {
        WorldConfig {
            seed: Some(7),
            chunk_size: 16,
            chunk_height: 64,
            render_distance: 1,
            worker_count: Some(0),
            eviction_probability: 0.0,
            autosave_interval_secs: 0,
            ..WorldConfig::default()
        }
    }

    fn open(store: Arc<MemoryStore>) -> ChunkManager {
        ChunkManager::open(small_config(), store, Box::new(NoBlockEntities)).unwrap()
    }

    #[test]
    fn update_streams_the_active_square() {
        let mut world = open(Arc::new(MemoryStore::new()));
        for _ in 0..20 {
            world.update(Point3::new(8.0, 40.0, 8.0));
        }
        assert_eq!(world.get_chunk_count().total, 9);
        assert_eq!(world.pending_count(), 0);
        assert_eq!(world.render_order().len(), 9);
        assert_eq!(world.render_order()[0], ChunkKey::new(0, 0));
    }

    #[test]
    fn seed_is_recorded_and_reused() {
        let store = Arc::new(MemoryStore::new());
        let first = open(store.clone());
        assert_eq!(first.get_seed(), 7);

        let config = WorldConfig {
            seed: Some(99),
            ..small_config()
        };
        let reopened = ChunkManager::open(config, store, Box::new(NoBlockEntities)).unwrap();
        assert_eq!(reopened.get_seed(), 7);
    }

    #[test]
    fn edits_on_a_border_rebuild_the_neighbor() {
        let mut world = open(Arc::new(MemoryStore::new()));
        world.wait_for_chunk(0, 0);
        world.wait_for_chunk(-1, 0);
        world.drain_mesh_commands();

        assert!(world.set_block(0, 10, 5, BlockType::AIR as u8));
        let commands = world.drain_mesh_commands();
        assert!(commands.contains(&MeshCommand::Upload(ChunkKey::new(0, 0))));
        assert!(commands.contains(&MeshCommand::Upload(ChunkKey::new(-1, 0))));
    }

    #[test]
    fn writes_to_unloaded_chunks_are_ignored() {
        let mut world = open(Arc::new(MemoryStore::new()));
        assert!(!world.set_block(100, 10, 100, BlockType::STONE as u8));
        assert_eq!(world.dirty_count(), 0);
    }

    #[test]
    fn clear_wipes_chunks_and_store() {
        let store = Arc::new(MemoryStore::new());
        let mut world = open(store.clone());
        world.wait_for_chunk(0, 0);
        world.flush();
        assert!(store.len() > 1);

        world.clear();
        assert_eq!(world.get_chunk_count().total, 0);
        assert!(!world.is_chunk_loaded(0, 0));
        // Only the new metadata record remains
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn open_rejects_an_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let config = WorldConfig {
            chunk_size: 0,
            ..small_config()
        };
        let result = ChunkManager::open(config, store.clone(), Box::new(NoBlockEntities));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "chunk_size",
                ..
            })
        ));
        // Nothing was written for the rejected world
        assert_eq!(store.len(), 0);
    }
}
