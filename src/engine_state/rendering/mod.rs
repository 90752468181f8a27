//! Renderer-facing output of the world engine.
//!
//! Nothing here talks to a GPU. The module turns resident chunk buffers into
//! vertex data against a shared texture atlas, tracks which meshes exist, and
//! decides which chunks the viewer can see. A renderer mirrors the meshes by
//! draining [`meshing::MeshCommand`]s.

pub mod meshing;
pub mod texture_atlas;
pub mod vertex;
pub mod visibility;

// Re-export commonly used types
pub use vertex::Vertex;
