//! Vertex data structures for voxel rendering.
//!
//! This module defines the interleaved vertex format handed to the renderer.
//! Chunk meshes keep their attributes in separate arrays; [`Vertex`] is the
//! packed view built from them for upload.

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// - Position: 3x f32 (12 bytes)
/// - Normal: 3x f32 (12 bytes)
/// - Texture Coordinates: 2x f32 (8 bytes)
/// - Color: 3x f32 (12 bytes)
///
/// Total size: 44 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in world space
    pub position: [f32; 3],
    /// Outward face normal
    pub normal: [f32; 3],
    /// Atlas texture coordinates (normalized 0.0-1.0)
    pub tex_coords: [f32; 2],
    /// Flat tint multiplied with the sampled texel
    pub color: [f32; 3],
}

impl Vertex {
    /// Byte distance between consecutive vertices.
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Byte offsets of the attributes, in shader location order.
    ///
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    /// - `location = 2`: tex_coords (vec2<f32>)
    /// - `location = 3`: color (vec3<f32>)
    pub const ATTRIBUTE_OFFSETS: [usize; 4] = [0, 12, 24, 32];

    /// Creates a new vertex.
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2], color: [f32; 3]) -> Self {
        Vertex {
            position,
            normal,
            tex_coords,
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 44);
        let vertex = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.25], [1.0; 3]);
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), Vertex::STRIDE);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[Vertex::ATTRIBUTE_OFFSETS[2] / 4], 0.5);
    }
}
