//! # Biome Module
//!
//! Maps world columns to the [`BiomeProfile`] that shapes their terrain.
//!
//! Only the plains biome exists today, but selection already goes through a
//! coherent-noise lookup over a list of profiles so that adding a biome is a
//! matter of extending that list. Callers must query per column and never cache
//! a profile for a whole chunk.

use noise::{NoiseFn, Perlin};

use crate::engine_state::voxels::block::block_type::BlockType;

/// Horizontal scale of the biome selection noise, in blocks.
const BIOME_NOISE_SCALE: f64 = 512.0;

/// Seed offset of the biome selector relative to the world seed.
const BIOME_SEED_OFFSET: u32 = 1;

/// Parameters controlling terrain shape and surface material of one biome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomeProfile {
    /// Display name.
    pub name: &'static str,
    /// Block placed at the terrain height.
    pub surface_block: BlockType,
    /// Block placed directly below the surface.
    pub subsurface_block: BlockType,
    /// Number of subsurface layers below the surface block.
    pub subsurface_depth: i32,
    /// Probability that an eligible surface column grows a tree.
    pub tree_chance: f32,
    /// Horizontal noise scale in blocks; larger means broader hills.
    pub terrain_scale: f64,
    /// Amplitude of the height noise in blocks.
    pub terrain_height: f64,
    /// Height the noise is centered on.
    pub base_height: i32,
}

/// Rolling grassland, the default biome.
pub const PLAINS: BiomeProfile = BiomeProfile {
    name: "plains",
    surface_block: BlockType::GRASS,
    subsurface_block: BlockType::DIRT,
    subsurface_depth: 3,
    tree_chance: 0.01,
    terrain_scale: 64.0,
    terrain_height: 16.0,
    base_height: 40,
};

/// Selects a biome for every world column.
///
/// The result is a pure function of `(seed, world_x, world_z)`; chunks generated
/// independently agree on the biome of every shared column.
#[derive(Debug, Clone)]
pub struct BiomeGenerator {
    /// Seed the selector was built from
    seed: u32,
    /// Low-frequency noise choosing between profiles
    selector: Perlin,
    /// Known biomes, never empty
    profiles: Vec<BiomeProfile>,
}

impl BiomeGenerator {
    /// Creates a generator knowing only the default biome.
    pub fn new(seed: u32) -> Self {
        Self::with_profiles(seed, vec![PLAINS])
    }

    /// Creates a generator choosing between the given biomes.
    ///
    /// # Arguments
    /// * `seed` - World seed
    /// * `profiles` - Candidate biomes; an empty list falls back to [`PLAINS`]
    pub fn with_profiles(seed: u32, mut profiles: Vec<BiomeProfile>) -> Self {
        if profiles.is_empty() {
            profiles.push(PLAINS);
        }
        Self {
            seed,
            selector: Perlin::new(seed.wrapping_add(BIOME_SEED_OFFSET)),
            profiles,
        }
    }

    /// Seed the selector is currently built from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Rebuilds the selector for a new seed.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.selector = Perlin::new(seed.wrapping_add(BIOME_SEED_OFFSET));
    }

    /// All known biomes.
    pub fn profiles(&self) -> &[BiomeProfile] {
        &self.profiles
    }

    /// Biome of the column at `(world_x, world_z)`.
    pub fn biome_at(&self, world_x: i32, world_z: i32) -> &BiomeProfile {
        if self.profiles.len() == 1 {
            return &self.profiles[0];
        }

        let sample = self.selector.get([
            world_x as f64 / BIOME_NOISE_SCALE,
            world_z as f64 / BIOME_NOISE_SCALE,
        ]);
        let normalized = ((sample + 1.0) * 0.5).clamp(0.0, 1.0);
        let slot = (normalized * self.profiles.len() as f64) as usize;
        &self.profiles[slot.min(self.profiles.len() - 1)]
    }
}
