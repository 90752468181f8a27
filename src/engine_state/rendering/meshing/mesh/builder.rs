//! Face-culling mesh builder.
//!
//! For every non-air voxel each of the six faces is emitted iff the voxel on
//! the other side is transparent. Neighbors outside the chunk are looked up in
//! the world; a neighbor chunk without a buffer counts as air, so border faces
//! are drawn until that neighbor loads and both chunks are rebuilt.

use std::sync::Arc;

use log::debug;
use web_time::Instant;

use crate::engine_state::{
    rendering::texture_atlas::TextureAtlas,
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType, BlockTypeSize},
        block_entity::BlockEntityStore,
        chunk::{ChunkBuffer, ChunkKey},
        chunk_data::ChunkDataManager,
    },
};

use super::{face::Face, mesh::ChunkMesh};

/// Whether a face bordering a voxel with this id must be drawn.
///
/// Ids outside the registry are treated as opaque; air is always transparent.
pub fn is_transparent_id(id: BlockTypeSize) -> bool {
    match BlockType::from_id(id) {
        Some(block) => block.is_transparent(),
        None => false,
    }
}

/// Turns chunk buffers into [`ChunkMesh`]es.
#[derive(Debug, Clone)]
pub struct ChunkMeshBuilder {
    atlas: Arc<TextureAtlas>,
}

impl ChunkMeshBuilder {
    /// Creates a builder mapping faces into the given shared atlas.
    pub fn new(atlas: Arc<TextureAtlas>) -> Self {
        Self { atlas }
    }

    /// The atlas every mesh samples from.
    pub fn atlas(&self) -> &Arc<TextureAtlas> {
        &self.atlas
    }

    /// Builds the mesh of a resident chunk.
    ///
    /// # Arguments
    /// * `data` - World data; the chunk's own buffer and its neighbors are read from here
    /// * `key` - Chunk to mesh
    /// * `entities` - Orientation source for directional blocks
    ///
    /// # Returns
    /// `None` if `key` has no buffer. A mesh is never built for a chunk that is not resident.
    pub fn build(
        &self,
        data: &ChunkDataManager,
        key: ChunkKey,
        entities: &dyn BlockEntityStore,
    ) -> Option<ChunkMesh> {
        let buffer = data.buffer(key)?;
        Some(self.build_buffer(buffer, key, data, entities))
    }

    fn build_buffer(
        &self,
        buffer: &ChunkBuffer,
        key: ChunkKey,
        data: &ChunkDataManager,
        entities: &dyn BlockEntityStore,
    ) -> ChunkMesh {
        let start = Instant::now();
        let dims = buffer.dims();
        let (origin_x, origin_z) = dims.origin(key);
        let mut mesh = ChunkMesh::new(key);

        for (pos, id) in buffer.iter_solid() {
            // Unknown ids have no appearance and are skipped
            let Some(block) = BlockType::from_id(id) else {
                continue;
            };
            let (lx, ly, lz) = (pos.x as i32, pos.y as i32, pos.z as i32);
            let (wx, wy, wz) = (origin_x + lx, ly, origin_z + lz);

            let facing = if block.is_directional() {
                entities.orientation(wx, wy, wz)
            } else {
                None
            };

            for side in BlockSide::all() {
                let (dx, dy, dz) = side.offset();
                let neighbor = match buffer.get_checked(lx + dx, ly + dy, lz + dz) {
                    Some(neighbor) => neighbor,
                    None => data.get_block(wx + dx, wy + dy, wz + dz),
                };
                if !is_transparent_id(neighbor) {
                    continue;
                }

                let appearance = block.face_appearance(side, facing);
                let rect = self.atlas.slot_rect(appearance.slot);
                mesh.push_face(&Face::new(wx, wy, wz, side), &rect, appearance.tint);
            }
        }

        debug!(
            "meshed chunk {} ({} faces) in {:?}",
            key,
            mesh.face_count(),
            start.elapsed()
        );
        mesh
    }
}
