//! # Chunk Data Module
//!
//! The in-memory home of every resident chunk buffer, and the dirty set that
//! tracks which of them differ from their persisted version.
//!
//! ## Dirty Revisions
//!
//! Each time a chunk becomes dirty it is stamped with a fresh revision number.
//! A save captures `(key, revision, bytes)`; when the save completes, the key is
//! cleared only if its revision is unchanged. An edit that lands while the save
//! is in flight therefore keeps the chunk dirty for the next save.

use std::collections::HashMap;

use super::{
    block::BlockTypeSize,
    chunk::{ChunkBuffer, ChunkDimensions, ChunkKey},
    generation::TerrainGenerator,
};

/// Owner of all resident chunk buffers.
pub struct ChunkDataManager {
    /// Layout shared by every buffer
    dims: ChunkDimensions,
    /// Resident buffers by key
    chunks: HashMap<ChunkKey, ChunkBuffer>,
    /// Dirty keys and the revision at which they last changed
    dirty: HashMap<ChunkKey, u64>,
    /// Last revision handed out
    revision: u64,
}

impl ChunkDataManager {
    /// Creates an empty manager for chunks of the given dimensions.
    pub fn new(dims: ChunkDimensions) -> Self {
        Self {
            dims,
            chunks: HashMap::new(),
            dirty: HashMap::new(),
            revision: 0,
        }
    }

    /// Chunk layout.
    pub fn dims(&self) -> ChunkDimensions {
        self.dims
    }

    /// Block id at a world coordinate.
    ///
    /// # Returns
    /// Air (0) when `y` is outside the world or the chunk has no buffer.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockTypeSize {
        if y < 0 || y >= self.dims.height as i32 {
            return 0;
        }
        self.chunks
            .get(&self.dims.key_at(x, z))
            .map(|buffer| {
                buffer.get(
                    self.dims.world_to_local(x),
                    y as usize,
                    self.dims.world_to_local(z),
                )
            })
            .unwrap_or(0)
    }

    /// Writes a block id at a world coordinate and marks its chunk dirty.
    ///
    /// Never allocates: writes to unloaded chunks or outside the world are ignored.
    ///
    /// # Returns
    /// The key of the modified chunk, or `None` if nothing was written.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockTypeSize) -> Option<ChunkKey> {
        if y < 0 || y >= self.dims.height as i32 {
            return None;
        }
        let key = self.dims.key_at(x, z);
        let buffer = self.chunks.get_mut(&key)?;
        buffer.set(
            self.dims.world_to_local(x),
            y as usize,
            self.dims.world_to_local(z),
            id,
        );
        self.mark_dirty(key);
        Some(key)
    }

    /// Whether a non-air block is present at a world coordinate.
    pub fn has_block(&self, x: i32, y: i32, z: i32) -> bool {
        self.get_block(x, y, z) != 0
    }

    /// Height of the highest non-air voxel of a world column.
    ///
    /// Falls back to the terrain height when the chunk is not loaded, so
    /// queries about terrain that has not been generated yet still make sense.
    pub fn top_y(&self, x: i32, z: i32, terrain: &TerrainGenerator) -> i32 {
        match self.chunks.get(&self.dims.key_at(x, z)) {
            Some(buffer) => buffer
                .top_y(self.dims.world_to_local(x), self.dims.world_to_local(z))
                .map(|y| y as i32)
                .unwrap_or(0),
            None => terrain.height_at(x, z),
        }
    }

    /// Whether the chunk containing world column `(x, z)` has a buffer.
    pub fn is_chunk_loaded(&self, x: i32, z: i32) -> bool {
        self.chunks.contains_key(&self.dims.key_at(x, z))
    }

    /// Whether `key` has a buffer.
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Buffer of a resident chunk.
    pub fn buffer(&self, key: ChunkKey) -> Option<&ChunkBuffer> {
        self.chunks.get(&key)
    }

    /// Stores a buffer, replacing any previous one for the key.
    pub fn insert(&mut self, key: ChunkKey, buffer: ChunkBuffer) -> Option<ChunkBuffer> {
        self.chunks.insert(key, buffer)
    }

    /// Releases a buffer. The dirty flag is left untouched.
    pub fn remove(&mut self, key: ChunkKey) -> Option<ChunkBuffer> {
        self.chunks.remove(&key)
    }

    /// Keys of all resident chunks.
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is resident.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Stamps `key` with a new dirty revision.
    pub fn mark_dirty(&mut self, key: ChunkKey) {
        self.revision += 1;
        self.dirty.insert(key, self.revision);
    }

    /// Whether `key` has unsaved changes.
    pub fn is_dirty(&self, key: ChunkKey) -> bool {
        self.dirty.contains_key(&key)
    }

    /// Number of dirty chunks.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Dirty keys with their current revision.
    pub fn dirty_revisions(&self) -> impl Iterator<Item = (ChunkKey, u64)> + '_ {
        self.dirty.iter().map(|(&key, &revision)| (key, revision))
    }

    /// Clears the dirty flag of `key` if no edit happened since `revision`.
    ///
    /// # Returns
    /// `true` if the flag was cleared.
    pub fn mark_saved(&mut self, key: ChunkKey, revision: u64) -> bool {
        if self.dirty.get(&key) == Some(&revision) {
            self.dirty.remove(&key);
            return true;
        }
        false
    }

    /// Chunks whose mesh depends on the voxel at a world coordinate: its own
    /// chunk, plus each neighbor it borders when it lies on a chunk edge.
    pub fn affected_chunk_keys(&self, x: i32, z: i32) -> Vec<ChunkKey> {
        let key = self.dims.key_at(x, z);
        let (cx, cz) = key.coords();
        let last = self.dims.size - 1;
        let local_x = self.dims.world_to_local(x);
        let local_z = self.dims.world_to_local(z);

        let mut keys = vec![key];
        if local_x == 0 {
            keys.push(ChunkKey::new(cx - 1, cz));
        }
        if local_x == last {
            keys.push(ChunkKey::new(cx + 1, cz));
        }
        if local_z == 0 {
            keys.push(ChunkKey::new(cx, cz - 1));
        }
        if local_z == last {
            keys.push(ChunkKey::new(cx, cz + 1));
        }
        keys
    }

    /// Drops every buffer and dirty flag.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_chunk(key: ChunkKey) -> ChunkDataManager {
        let mut manager = ChunkDataManager::new(ChunkDimensions::default());
        manager.insert(key, ChunkBuffer::empty(manager.dims()));
        manager
    }

    #[test]
    fn set_block_on_unloaded_chunk_is_a_no_op() {
        let mut manager = ChunkDataManager::new(ChunkDimensions::default());
        assert_eq!(manager.set_block(5, 10, 5, 3), None);
        assert!(manager.is_empty());
        assert_eq!(manager.dirty_count(), 0);
    }

    #[test]
    fn out_of_range_height_reads_air() {
        let mut manager = manager_with_chunk(ChunkKey::new(0, 0));
        manager.set_block(1, 0, 1, 2);
        assert_eq!(manager.get_block(1, -1, 1), 0);
        assert_eq!(manager.get_block(1, 128, 1), 0);
        assert_eq!(manager.set_block(1, 128, 1, 2), None);
    }

    #[test]
    fn negative_world_coordinates_map_into_the_right_chunk() {
        let mut manager = manager_with_chunk(ChunkKey::new(-1, -1));
        assert_eq!(manager.set_block(-1, 5, -32, 4), Some(ChunkKey::new(-1, -1)));
        assert!(manager.has_block(-1, 5, -32));
        assert_eq!(manager.buffer(ChunkKey::new(-1, -1)).unwrap().get(31, 5, 0), 4);
        assert!(manager.is_chunk_loaded(-32, -1));
        assert!(!manager.is_chunk_loaded(0, 0));
    }

    #[test]
    fn edits_during_a_save_keep_the_chunk_dirty() {
        let key = ChunkKey::new(0, 0);
        let mut manager = manager_with_chunk(key);
        manager.set_block(1, 1, 1, 2);
        let (_, captured) = manager.dirty_revisions().next().unwrap();

        manager.set_block(2, 1, 1, 2);
        assert!(!manager.mark_saved(key, captured));
        assert!(manager.is_dirty(key));

        let (_, latest) = manager.dirty_revisions().next().unwrap();
        assert!(manager.mark_saved(key, latest));
        assert!(!manager.is_dirty(key));
    }

    #[test]
    fn top_y_falls_back_to_terrain_for_unloaded_chunks() {
        let terrain = TerrainGenerator::new(42, 128);
        let mut manager = manager_with_chunk(ChunkKey::new(0, 0));
        manager.set_block(3, 20, 3, 2);
        assert_eq!(manager.top_y(3, 3, &terrain), 20);
        assert_eq!(manager.top_y(100, 100, &terrain), terrain.height_at(100, 100));
    }

    #[test]
    fn affected_keys_only_include_bordered_neighbors() {
        let manager = ChunkDataManager::new(ChunkDimensions::default());
        assert_eq!(manager.affected_chunk_keys(5, 5), vec![ChunkKey::new(0, 0)]);
        assert_eq!(
            manager.affected_chunk_keys(0, 31),
            vec![ChunkKey::new(0, 0), ChunkKey::new(-1, 0), ChunkKey::new(0, 1)]
        );
        assert_eq!(
            manager.affected_chunk_keys(-1, 40),
            vec![ChunkKey::new(-1, 1), ChunkKey::new(0, 1)]
        );
    }
}
