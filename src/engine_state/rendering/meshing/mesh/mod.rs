//! Mesh generation for voxel rendering.
//!
//! This module converts chunk buffers into CPU-side triangle meshes using
//! per-face culling against neighbor transparency.
//!
//! # Architecture
//! - [`ChunkMeshBuilder`]: walks a chunk and decides which faces are visible
//! - [`Face`]: one quad of a voxel, with outward winding
//! - [`ChunkMesh`]: the resulting attribute arrays and index list

mod builder;
mod face;
mod mesh;

pub use builder::{is_transparent_id, ChunkMeshBuilder};
pub use face::Face;
pub use mesh::ChunkMesh;
