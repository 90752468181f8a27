//! Mesh ownership for resident chunks.
//!
//! # Architecture
//! - `ChunkMeshManager`: owns at most one mesh per chunk key and is the only
//!   place meshes are created or destroyed
//! - `MeshCommand`: what the renderer has to upload or release since it last looked
//! - `mesh/`: the face-culling builder and mesh data structures
//!
//! # Lifetime
//! Every release goes through [`ChunkMeshManager::unload`], whether it comes
//! from a chunk leaving the active area, a rebuild that finds no buffer, or the
//! least-recently-meshed chunk being pushed out when the mesh cap is reached.
//! The shared [`TextureAtlas`] is never released by any of these paths.

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use lru::LruCache;

mod mesh;

pub use mesh::*;

use crate::engine_state::{
    rendering::texture_atlas::TextureAtlas,
    voxels::{block_entity::BlockEntityStore, chunk::ChunkKey, chunk_data::ChunkDataManager},
};

/// Change to the set of meshes the renderer has to mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshCommand {
    /// The mesh of this chunk was (re)built; upload it.
    Upload(ChunkKey),
    /// The mesh of this chunk is gone; release its GPU buffers.
    Release(ChunkKey),
}

/// Central owner of chunk meshes.
pub struct ChunkMeshManager {
    /// Builds meshes against the shared atlas
    builder: ChunkMeshBuilder,
    /// One mesh per chunk
    meshes: HashMap<ChunkKey, ChunkMesh>,
    /// LRU cache to track which chunks have been meshed
    least_recently_meshed_chunks: LruCache<ChunkKey, ()>,
    /// Commands not yet drained by the renderer
    commands: Vec<MeshCommand>,
}

impl ChunkMeshManager {
    /// Creates a mesh manager holding at most `capacity` meshes.
    pub fn new(atlas: Arc<TextureAtlas>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            builder: ChunkMeshBuilder::new(atlas),
            meshes: HashMap::new(),
            least_recently_meshed_chunks: LruCache::new(capacity),
            commands: Vec::new(),
        }
    }

    /// The shared atlas.
    pub fn atlas(&self) -> &Arc<TextureAtlas> {
        self.builder.atlas()
    }

    /// (Re)builds the mesh of `key` from its resident buffer.
    ///
    /// Replaces only this chunk's geometry. If the chunk has no buffer any
    /// existing mesh is released instead.
    ///
    /// # Returns
    /// `true` if a mesh was built.
    pub fn rebuild(
        &mut self,
        data: &ChunkDataManager,
        key: ChunkKey,
        entities: &dyn BlockEntityStore,
    ) -> bool {
        let Some(mesh) = self.builder.build(data, key, entities) else {
            self.unload(key);
            return false;
        };

        self.meshes.insert(key, mesh);
        self.commands.push(MeshCommand::Upload(key));

        if let Some((evicted, _)) = self.least_recently_meshed_chunks.push(key, ()) {
            if evicted != key {
                log::debug!("mesh cap reached, releasing least recently meshed chunk {}", evicted);
                self.release(evicted);
            }
        }
        true
    }

    /// Releases the mesh of `key`, if any.
    ///
    /// # Returns
    /// `true` if a mesh existed.
    pub fn unload(&mut self, key: ChunkKey) -> bool {
        self.least_recently_meshed_chunks.pop(&key);
        self.release(key)
    }

    fn release(&mut self, key: ChunkKey) -> bool {
        if self.meshes.remove(&key).is_some() {
            self.commands.push(MeshCommand::Release(key));
            return true;
        }
        false
    }

    /// Mesh of `key`.
    pub fn mesh(&self, key: ChunkKey) -> Option<&ChunkMesh> {
        self.meshes.get(&key)
    }

    /// Whether `key` has a mesh.
    pub fn has_mesh(&self, key: ChunkKey) -> bool {
        self.meshes.contains_key(&key)
    }

    /// Keys of all meshed chunks.
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.meshes.keys().copied()
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether no mesh exists.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Takes the commands recorded since the last call.
    pub fn drain_commands(&mut self) -> Vec<MeshCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Releases every mesh.
    pub fn clear(&mut self) {
        let keys: Vec<ChunkKey> = self.meshes.keys().copied().collect();
        for key in keys {
            self.unload(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        config::AtlasConfig,
        voxels::{
            block_entity::NoBlockEntities,
            chunk::{ChunkBuffer, ChunkDimensions},
        },
    };

    fn setup(capacity: usize, keys: &[ChunkKey]) -> (ChunkMeshManager, ChunkDataManager) {
        let atlas = Arc::new(TextureAtlas::new(AtlasConfig::default()));
        let mut data = ChunkDataManager::new(ChunkDimensions::new(8, 16));
        for &key in keys {
            data.insert(key, ChunkBuffer::empty(data.dims()));
        }
        (ChunkMeshManager::new(atlas, capacity), data)
    }

    #[test]
    fn rebuild_replaces_only_that_chunk_and_keeps_the_atlas() {
        let a = ChunkKey::new(0, 0);
        let b = ChunkKey::new(1, 0);
        let (mut meshes, mut data) = setup(8, &[a, b]);
        let atlas = Arc::clone(meshes.atlas());

        meshes.rebuild(&data, a, &NoBlockEntities);
        meshes.rebuild(&data, b, &NoBlockEntities);
        data.set_block(1, 1, 1, 2);
        meshes.rebuild(&data, a, &NoBlockEntities);

        assert_eq!(meshes.mesh(a).unwrap().face_count(), 6);
        assert!(meshes.mesh(b).unwrap().is_empty());
        assert!(Arc::ptr_eq(&atlas, meshes.atlas()));
        assert_eq!(
            meshes.drain_commands(),
            vec![MeshCommand::Upload(a), MeshCommand::Upload(b), MeshCommand::Upload(a)]
        );
    }

    #[test]
    fn rebuild_without_buffer_releases_the_mesh() {
        let key = ChunkKey::new(0, 0);
        let (mut meshes, mut data) = setup(8, &[key]);
        assert!(meshes.rebuild(&data, key, &NoBlockEntities));
        data.remove(key);
        assert!(!meshes.rebuild(&data, key, &NoBlockEntities));
        assert!(!meshes.has_mesh(key));
        assert_eq!(meshes.drain_commands().last(), Some(&MeshCommand::Release(key)));
    }

    #[test]
    fn capacity_releases_the_least_recently_meshed_chunk() {
        let keys = [ChunkKey::new(0, 0), ChunkKey::new(0, 1), ChunkKey::new(0, 2)];
        let (mut meshes, data) = setup(2, &keys);
        for key in keys {
            meshes.rebuild(&data, key, &NoBlockEntities);
        }
        assert_eq!(meshes.len(), 2);
        assert!(!meshes.has_mesh(keys[0]));
        assert!(meshes
            .drain_commands()
            .contains(&MeshCommand::Release(keys[0])));
    }
}
