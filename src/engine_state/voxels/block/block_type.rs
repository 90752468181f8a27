//! # Block Type Module
//!
//! This module defines the closed set of block types stored in chunk buffers,
//! conversion from the raw byte id, lookup by name, and per-type properties
//! such as transparency and break time.

use std::fmt;

use num_derive::FromPrimitive;
use phf::phf_map;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the byte stored in chunk buffers and on disk, so
/// existing variants must never be renumbered. `FromPrimitive` provides the
/// checked conversion from a raw byte.
#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Always id 0.
    AIR = 0,

    /// Bottom layer of every column. Cannot be broken.
    BEDROCK = 1,

    /// Default underground material.
    STONE = 2,

    /// Subsurface material of the plains biome.
    DIRT = 3,

    /// Surface material of the plains biome.
    GRASS = 4,

    /// Loose sand.
    SAND = 5,

    /// Tree trunk.
    LOG = 6,

    /// Tree canopy. See-through.
    LEAVES = 7,

    /// Most common ore.
    COAL_ORE = 8,

    /// Mid-depth ore.
    IRON_ORE = 9,

    /// Deep, rare ore.
    GOLD_ORE = 10,

    /// Deepest, rarest ore.
    DIAMOND_ORE = 11,

    /// Player-placed stone.
    COBBLESTONE = 12,

    /// Processed wood.
    PLANKS = 13,

    /// See-through building block.
    GLASS = 14,

    /// Directional block whose front face depends on its stored facing.
    FURNACE = 15,

    /// Workbench.
    CRAFTING_TABLE = 16,
}

/// Number of defined block types. Ids `>= BLOCK_TYPE_COUNT` are invalid.
pub const BLOCK_TYPE_COUNT: usize = 17;

/// Compile-time map from block name to block type, used by configuration files
/// and tooling that refer to blocks by name.
static BLOCK_TYPES_BY_NAME: phf::Map<&'static str, BlockType> = phf_map! {
    "air" => BlockType::AIR,
    "bedrock" => BlockType::BEDROCK,
    "stone" => BlockType::STONE,
    "dirt" => BlockType::DIRT,
    "grass" => BlockType::GRASS,
    "sand" => BlockType::SAND,
    "log" => BlockType::LOG,
    "leaves" => BlockType::LEAVES,
    "coal_ore" => BlockType::COAL_ORE,
    "iron_ore" => BlockType::IRON_ORE,
    "gold_ore" => BlockType::GOLD_ORE,
    "diamond_ore" => BlockType::DIAMOND_ORE,
    "cobblestone" => BlockType::COBBLESTONE,
    "planks" => BlockType::PLANKS,
    "glass" => BlockType::GLASS,
    "furnace" => BlockType::FURNACE,
    "crafting_table" => BlockType::CRAFTING_TABLE,
};

impl BlockType {
    /// Converts a raw block id into a `BlockType`.
    ///
    /// # Returns
    /// `None` if the id does not name a known block.
    pub fn from_id(id: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u8(id)
    }

    /// Looks a block type up by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        BLOCK_TYPES_BY_NAME.get(name).copied()
    }

    /// Raw id stored in chunk buffers.
    pub fn id(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Lowercase name, the inverse of [`BlockType::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            BlockType::AIR => "air",
            BlockType::BEDROCK => "bedrock",
            BlockType::STONE => "stone",
            BlockType::DIRT => "dirt",
            BlockType::GRASS => "grass",
            BlockType::SAND => "sand",
            BlockType::LOG => "log",
            BlockType::LEAVES => "leaves",
            BlockType::COAL_ORE => "coal_ore",
            BlockType::IRON_ORE => "iron_ore",
            BlockType::GOLD_ORE => "gold_ore",
            BlockType::DIAMOND_ORE => "diamond_ore",
            BlockType::COBBLESTONE => "cobblestone",
            BlockType::PLANKS => "planks",
            BlockType::GLASS => "glass",
            BlockType::FURNACE => "furnace",
            BlockType::CRAFTING_TABLE => "crafting_table",
        }
    }

    /// Whether neighboring faces stay visible through this block.
    pub fn is_transparent(self) -> bool {
        matches!(self, BlockType::AIR | BlockType::LEAVES | BlockType::GLASS)
    }

    /// Whether gameplay may remove this block.
    pub fn is_breakable(self) -> bool {
        !matches!(self, BlockType::AIR | BlockType::BEDROCK)
    }

    /// Whether the block's front face depends on a stored facing.
    pub fn is_directional(self) -> bool {
        matches!(self, BlockType::FURNACE)
    }

    /// Seconds needed to break the block by hand.
    ///
    /// This table is the only source of break durations in the engine.
    /// Returns `None` for blocks that cannot be broken.
    pub fn break_time(self) -> Option<f32> {
        let seconds = match self {
            BlockType::AIR | BlockType::BEDROCK => return None,
            BlockType::LEAVES => 0.2,
            BlockType::GLASS => 0.3,
            BlockType::DIRT | BlockType::SAND => 0.5,
            BlockType::GRASS => 0.6,
            BlockType::STONE => 1.5,
            BlockType::LOG | BlockType::PLANKS | BlockType::COBBLESTONE => 2.0,
            BlockType::CRAFTING_TABLE => 2.5,
            BlockType::COAL_ORE | BlockType::IRON_ORE => 3.0,
            BlockType::GOLD_ORE | BlockType::DIAMOND_ORE => 3.0,
            BlockType::FURNACE => 3.5,
        };
        Some(seconds)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for BlockType {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        BlockType::from_name(&name).ok_or_else(|| format!("unknown block type `{name}`"))
    }
}

impl From<BlockType> for String {
    fn from(block: BlockType) -> Self {
        block.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_below_count_round_trips() {
        for id in 0..BLOCK_TYPE_COUNT as u8 {
            let block = BlockType::from_id(id).expect("defined id");
            assert_eq!(block.id(), id);
            assert_eq!(BlockType::from_name(block.name()), Some(block));
        }
        assert_eq!(BlockType::from_id(BLOCK_TYPE_COUNT as u8), None);
        assert_eq!(BlockType::from_id(255), None);
    }

    #[test]
    fn bedrock_is_unbreakable() {
        assert!(!BlockType::BEDROCK.is_breakable());
        assert_eq!(BlockType::BEDROCK.break_time(), None);
        assert!(BlockType::STONE.break_time().is_some());
    }

    #[test]
    fn see_through_blocks() {
        assert!(BlockType::AIR.is_transparent());
        assert!(BlockType::GLASS.is_transparent());
        assert!(BlockType::LEAVES.is_transparent());
        assert!(!BlockType::STONE.is_transparent());
    }
}
