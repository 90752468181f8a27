//! Shared block texture atlas layout.
//!
//! The atlas is one square texture split into `slots_per_row²` equal slots.
//! Every chunk mesh references the same [`TextureAtlas`] through an `Arc`;
//! rebuilding or releasing a chunk mesh never touches it.

use crate::engine_state::{config::AtlasConfig, voxels::block::FALLBACK_SLOT};

/// Sub-rectangle of the atlas in normalized texture coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvRect {
    /// Left edge.
    pub u0: f32,
    /// Top edge.
    pub v0: f32,
    /// Right edge.
    pub u1: f32,
    /// Bottom edge.
    pub v1: f32,
}

/// Layout of the block texture atlas.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureAtlas {
    slots_per_row: u32,
    tile_pixels: u32,
    /// Inward inset applied to every slot, in normalized units
    inset: f32,
}

impl TextureAtlas {
    /// Creates an atlas layout. Each slot is shrunk by half a texel on every
    /// side so linear filtering never samples a neighboring slot.
    pub fn new(config: AtlasConfig) -> Self {
        let slots_per_row = config.slots_per_row.max(1);
        let tile_pixels = config.tile_pixels.max(1);
        let atlas_pixels = (slots_per_row * tile_pixels) as f32;
        Self {
            slots_per_row,
            tile_pixels,
            inset: 0.5 / atlas_pixels,
        }
    }

    /// Number of slots in the atlas.
    pub fn slot_count(&self) -> u32 {
        self.slots_per_row * self.slots_per_row
    }

    /// Edge length of the atlas texture in texels.
    pub fn size_pixels(&self) -> u32 {
        self.slots_per_row * self.tile_pixels
    }

    /// Inset applied to each slot rectangle.
    pub fn inset(&self) -> f32 {
        self.inset
    }

    /// Normalized rectangle of a slot, inset. Slots outside the atlas map to
    /// the fallback slot.
    pub fn slot_rect(&self, slot: u16) -> UvRect {
        let slot = if u32::from(slot) < self.slot_count() {
            u32::from(slot)
        } else {
            u32::from(FALLBACK_SLOT)
        };
        let step = 1.0 / self.slots_per_row as f32;
        let column = (slot % self.slots_per_row) as f32;
        let row = (slot / self.slots_per_row) as f32;

        UvRect {
            u0: column * step + self.inset,
            v0: row * step + self.inset,
            u1: (column + 1.0) * step - self.inset,
            v1: (row + 1.0) * step - self.inset,
        }
    }
}
