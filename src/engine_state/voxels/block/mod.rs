//! # Block Module
//!
//! This module provides the block registry for the world engine: block type
//! definitions, block faces, and the per-face appearance table used by the
//! mesh builder.

use block_side::{BlockSide, Facing};
use block_type::{BlockType, BLOCK_TYPE_COUNT};

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
/// Chunk buffers are dense arrays of this type; 0 is air.
pub type BlockTypeSize = u8;

/// Atlas slot reserved for the neutral fallback texture. Untextured blocks are
/// drawn with this slot and colored by their tint.
pub const FALLBACK_SLOT: u16 = 0;

/// Flat white tint, used for textured faces so the atlas color shows through.
pub const WHITE_TINT: [f32; 3] = [1.0, 1.0, 1.0];

/// Maps each block type to its atlas slot for each face.
///
/// The outer array is indexed by block id.
/// The inner array contains 6 slots, one per face in the order:
/// [Front, Back, Bottom, Top, Left, Right]
/// A slot of `FALLBACK_SLOT` marks an untextured face that is colored by
/// `BLOCK_TYPE_TO_TINTS` instead.
pub static BLOCK_TYPE_TO_TEXTURE_SLOTS: [[u16; 6]; BLOCK_TYPE_COUNT] = [
    [0, 0, 0, 0, 0, 0],       // AIR
    [1, 1, 1, 1, 1, 1],       // BEDROCK
    [2, 2, 2, 2, 2, 2],       // STONE
    [3, 3, 3, 3, 3, 3],       // DIRT
    [5, 5, 3, 4, 5, 5],       // GRASS (top: 4, bottom: dirt, sides: 5)
    [0, 0, 0, 0, 0, 0],       // SAND (untextured)
    [7, 7, 8, 8, 7, 7],       // LOG (bark sides, rings top/bottom)
    [0, 0, 0, 0, 0, 0],       // LEAVES (untextured)
    [10, 10, 10, 10, 10, 10], // COAL_ORE
    [11, 11, 11, 11, 11, 11], // IRON_ORE
    [12, 12, 12, 12, 12, 12], // GOLD_ORE
    [13, 13, 13, 13, 13, 13], // DIAMOND_ORE
    [14, 14, 14, 14, 14, 14], // COBBLESTONE
    [15, 15, 15, 15, 15, 15], // PLANKS
    [16, 16, 16, 16, 16, 16], // GLASS
    [18, 18, 19, 19, 18, 18], // FURNACE (front resolved from facing)
    [21, 21, 15, 20, 22, 21], // CRAFTING_TABLE
];

/// Atlas slot of the furnace front face.
pub const FURNACE_FRONT_SLOT: u16 = 17;

/// Flat tint per block id for untextured blocks.
static BLOCK_TYPE_TO_TINTS: [[f32; 3]; BLOCK_TYPE_COUNT] = [
    WHITE_TINT,        // AIR
    WHITE_TINT,        // BEDROCK
    WHITE_TINT,        // STONE
    WHITE_TINT,        // DIRT
    WHITE_TINT,        // GRASS
    [0.86, 0.80, 0.56], // SAND
    WHITE_TINT,        // LOG
    [0.30, 0.62, 0.22], // LEAVES
    WHITE_TINT,        // COAL_ORE
    WHITE_TINT,        // IRON_ORE
    WHITE_TINT,        // GOLD_ORE
    WHITE_TINT,        // DIAMOND_ORE
    WHITE_TINT,        // COBBLESTONE
    WHITE_TINT,        // PLANKS
    WHITE_TINT,        // GLASS
    WHITE_TINT,        // FURNACE
    WHITE_TINT,        // CRAFTING_TABLE
];

/// Resolved look of one block face: which atlas slot to sample and which flat
/// color to multiply it with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FaceAppearance {
    /// Atlas slot to sample.
    pub slot: u16,
    /// Per-vertex tint.
    pub tint: [f32; 3],
}

impl BlockType {
    /// Resolves the appearance of one face of this block.
    ///
    /// # Arguments
    /// * `side` - The face being drawn
    /// * `facing` - Stored orientation for directional blocks; `None` falls back
    ///   to the default facing
    ///
    /// # Returns
    /// The atlas slot and tint for the face. Textured faces always get a white
    /// tint.
    pub fn face_appearance(self, side: BlockSide, facing: Option<Facing>) -> FaceAppearance {
        let id = self as usize;
        let mut slot = BLOCK_TYPE_TO_TEXTURE_SLOTS[id][side as usize];

        if self.is_directional() && side == facing.unwrap_or_default().side() {
            slot = FURNACE_FRONT_SLOT;
        }

        let tint = if slot == FALLBACK_SLOT {
            BLOCK_TYPE_TO_TINTS[id]
        } else {
            WHITE_TINT
        };

        FaceAppearance { slot, tint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grass_has_distinct_top_side_and_bottom() {
        let top = BlockType::GRASS.face_appearance(BlockSide::TOP, None);
        let side = BlockType::GRASS.face_appearance(BlockSide::LEFT, None);
        let bottom = BlockType::GRASS.face_appearance(BlockSide::BOTTOM, None);
        assert_ne!(top.slot, side.slot);
        assert_eq!(
            bottom.slot,
            BlockType::DIRT.face_appearance(BlockSide::TOP, None).slot
        );
        assert_eq!(top.tint, WHITE_TINT);
    }

    #[test]
    fn untextured_blocks_use_fallback_slot_and_tint() {
        let leaves = BlockType::LEAVES.face_appearance(BlockSide::TOP, None);
        assert_eq!(leaves.slot, FALLBACK_SLOT);
        assert_ne!(leaves.tint, WHITE_TINT);
    }

    #[test]
    fn furnace_front_follows_facing() {
        let east = Some(Facing::East);
        assert_eq!(
            BlockType::FURNACE.face_appearance(BlockSide::RIGHT, east).slot,
            FURNACE_FRONT_SLOT
        );
        assert_ne!(
            BlockType::FURNACE.face_appearance(BlockSide::FRONT, east).slot,
            FURNACE_FRONT_SLOT
        );
        // Absent orientation defaults to facing south (+Z).
        assert_eq!(
            BlockType::FURNACE.face_appearance(BlockSide::FRONT, None).slot,
            FURNACE_FRONT_SLOT
        );
    }
}
