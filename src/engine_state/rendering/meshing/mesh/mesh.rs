//! CPU-side chunk mesh.
//!
//! Attributes are kept in separate arrays (positions, normals, uvs, colors)
//! plus a shared index list. [`ChunkMesh::vertices`] interleaves them into the
//! packed [`Vertex`] format for upload.

use crate::engine_state::{
    rendering::{texture_atlas::UvRect, Vertex},
    voxels::chunk::ChunkKey,
};

use super::face::Face;

/// Geometry of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMesh {
    /// Chunk this mesh was built from
    pub key: ChunkKey,
    /// World-space vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex outward normals
    pub normals: Vec<[f32; 3]>,
    /// Per-vertex atlas coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Per-vertex tints
    pub colors: Vec<[f32; 3]>,
    /// Triangle list, six indices per face
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Creates an empty mesh for `key`.
    pub fn new(key: ChunkKey) -> Self {
        ChunkMesh {
            key,
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Appends one quad as two triangles.
    pub fn push_face(&mut self, face: &Face, rect: &UvRect, tint: [f32; 3]) {
        let base = self.positions.len() as u32;
        let normal = face.block_side.normal();

        for (corner, uv) in face.corners().iter().zip(Face::tex_coords(rect)) {
            self.positions.push([corner.x, corner.y, corner.z]);
            self.normals.push(normal);
            self.uvs.push(uv);
            self.colors.push(tint);
        }

        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Number of quads.
    pub fn face_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether the mesh has no geometry (e.g. an all-air chunk).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Interleaved vertex view for upload.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .zip(&self.colors)
            .map(|(((&position, &normal), &uv), &color)| Vertex::new(position, normal, uv, color))
            .collect()
    }

    /// Index list as raw bytes for upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
