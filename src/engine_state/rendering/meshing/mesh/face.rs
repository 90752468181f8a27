use cgmath::Point3;

use crate::engine_state::{
    rendering::texture_atlas::UvRect,
    voxels::block::block_side::BlockSide,
};

/// Represents a single quad face of a voxel.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right,
/// upper-left). Seen from outside the voxel the corners run counter-clockwise,
/// so the two triangles `(ll, lr, ur)` and `(ll, ur, ul)` face outward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-left corner in world space
    pub ll: Point3<f32>,
    /// Lower-right corner in world space
    pub lr: Point3<f32>,
    /// Upper-right corner in world space
    pub ur: Point3<f32>,
    /// Upper-left corner in world space
    pub ul: Point3<f32>,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates the face of the voxel at world coordinate `(x, y, z)` on the given side.
    ///
    /// # Arguments
    /// * `x`, `y`, `z` - Minimum corner of the voxel in world space
    /// * `block_side` - Which side of the block this face represents
    pub fn new(x: i32, y: i32, z: i32, block_side: BlockSide) -> Self {
        let (i, j, k) = (x as f32, y as f32, z as f32);
        let p = Point3::new;

        let [ll, lr, ur, ul] = match block_side {
            BlockSide::FRONT => [
                p(i, j, k + 1.0),
                p(i + 1.0, j, k + 1.0),
                p(i + 1.0, j + 1.0, k + 1.0),
                p(i, j + 1.0, k + 1.0),
            ],
            BlockSide::BACK => [
                p(i + 1.0, j, k),
                p(i, j, k),
                p(i, j + 1.0, k),
                p(i + 1.0, j + 1.0, k),
            ],
            BlockSide::BOTTOM => [
                p(i, j, k),
                p(i + 1.0, j, k),
                p(i + 1.0, j, k + 1.0),
                p(i, j, k + 1.0),
            ],
            BlockSide::TOP => [
                p(i, j + 1.0, k + 1.0),
                p(i + 1.0, j + 1.0, k + 1.0),
                p(i + 1.0, j + 1.0, k),
                p(i, j + 1.0, k),
            ],
            BlockSide::LEFT => [
                p(i, j, k),
                p(i, j, k + 1.0),
                p(i, j + 1.0, k + 1.0),
                p(i, j + 1.0, k),
            ],
            BlockSide::RIGHT => [
                p(i + 1.0, j, k + 1.0),
                p(i + 1.0, j, k),
                p(i + 1.0, j + 1.0, k),
                p(i + 1.0, j + 1.0, k + 1.0),
            ],
        };

        Face {
            ll,
            lr,
            ur,
            ul,
            block_side,
        }
    }

    /// Corners in emission order.
    pub fn corners(&self) -> [Point3<f32>; 4] {
        [self.ll, self.lr, self.ur, self.ul]
    }

    /// Texture coordinates matching [`Face::corners`] for an atlas slot.
    pub fn tex_coords(rect: &UvRect) -> [[f32; 2]; 4] {
        [
            [rect.u0, rect.v1],
            [rect.u1, rect.v1],
            [rect.u1, rect.v0],
            [rect.u0, rect.v0],
        ]
    }
}
