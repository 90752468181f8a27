//! # Block Side Module
//!
//! This module defines the six faces of a voxel block, the direction each one
//! points to, and the horizontal facing used by directional blocks.

use serde::{Deserialize, Serialize};

/// Represents the six possible faces of a voxel block.
///
/// Each variant is assigned a stable integer value used to index per-face
/// tables (texture slots, tints). The order is:
/// [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in table order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Offset from a voxel to the neighbor this face touches.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            BlockSide::FRONT => (0, 0, 1),
            BlockSide::BACK => (0, 0, -1),
            BlockSide::BOTTOM => (0, -1, 0),
            BlockSide::TOP => (0, 1, 0),
            BlockSide::LEFT => (-1, 0, 0),
            BlockSide::RIGHT => (1, 0, 0),
        }
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> [f32; 3] {
        let (x, y, z) = self.offset();
        [x as f32, y as f32, z as f32]
    }

    /// Whether the face is one of the four vertical sides.
    pub fn is_horizontal(self) -> bool {
        !matches!(self, BlockSide::TOP | BlockSide::BOTTOM)
    }
}

/// Horizontal direction a directional block (e.g. a furnace) faces.
///
/// North is negative Z, matching the usual map convention.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Negative Z.
    North,
    /// Positive Z.
    #[default]
    South,
    /// Positive X.
    East,
    /// Negative X.
    West,
}

impl Facing {
    /// The block face pointing in this direction.
    pub fn side(self) -> BlockSide {
        match self {
            Facing::North => BlockSide::BACK,
            Facing::South => BlockSide::FRONT,
            Facing::East => BlockSide::RIGHT,
            Facing::West => BlockSide::LEFT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_faces_have_opposite_offsets() {
        let pairs = [
            (BlockSide::FRONT, BlockSide::BACK),
            (BlockSide::TOP, BlockSide::BOTTOM),
            (BlockSide::LEFT, BlockSide::RIGHT),
        ];
        for (a, b) in pairs {
            let (ax, ay, az) = a.offset();
            let (bx, by, bz) = b.offset();
            assert_eq!((ax + bx, ay + by, az + bz), (0, 0, 0));
        }
    }

    #[test]
    fn table_order_matches_discriminants() {
        for (i, side) in BlockSide::all().iter().enumerate() {
            assert_eq!(*side as usize, i);
        }
    }

    #[test]
    fn default_facing_is_front() {
        assert_eq!(Facing::default().side(), BlockSide::FRONT);
    }
}
