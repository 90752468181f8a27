//! # Terrain Module
//!
//! Height field and column fill for newly generated chunks.
//!
//! ## Column Layout
//!
//! From bottom to top, with `h = height_at(x, z)` and `d` the biome's
//! subsurface depth:
//!
//! ```text
//! y == 0            bedrock
//! 0 < y < h - d     stone
//! h - d <= y < h    subsurface block
//! y == h            surface block
//! y > h             air
//! ```

use noise::{NoiseFn, Perlin};

use crate::engine_state::voxels::{
    block::{block_type::BlockType, BlockTypeSize},
    chunk::ChunkBuffer,
};

use super::biome::{BiomeGenerator, BiomeProfile};

/// Deterministic terrain from a seed.
///
/// `TerrainGenerator` owns the [`BiomeGenerator`] it samples so both are always
/// reseeded together.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    /// World seed
    seed: u32,
    /// Height noise
    noise: Perlin,
    /// Biome lookup sharing the seed
    biomes: BiomeGenerator,
    /// Vertical extent of the world in blocks
    chunk_height: usize,
}

impl TerrainGenerator {
    /// Creates a terrain generator for worlds `chunk_height` blocks tall.
    pub fn new(seed: u32, chunk_height: usize) -> Self {
        Self::with_biomes(BiomeGenerator::new(seed), chunk_height)
    }

    /// Creates a terrain generator around an existing biome generator, adopting its seed.
    pub fn with_biomes(biomes: BiomeGenerator, chunk_height: usize) -> Self {
        let seed = biomes.seed();
        Self {
            seed,
            noise: Perlin::new(seed),
            biomes,
            chunk_height,
        }
    }

    /// Current seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Reseeds the height noise and the owned biome generator.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.noise = Perlin::new(seed);
        self.biomes.set_seed(seed);
    }

    /// The biome generator sampled by this terrain.
    pub fn biomes(&self) -> &BiomeGenerator {
        &self.biomes
    }

    /// Surface height of the column at `(world_x, world_z)`.
    ///
    /// # Returns
    /// `floor(noise(x / scale, z / scale) * terrain_height) + base_height`,
    /// clamped to `[1, chunk_height - 1]`.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let biome = self.biomes.biome_at(world_x, world_z);
        let sample = self.noise.get([
            world_x as f64 / biome.terrain_scale,
            world_z as f64 / biome.terrain_scale,
        ]);
        let height = (sample * biome.terrain_height).floor() as i32 + biome.base_height;
        height.clamp(1, self.chunk_height as i32 - 1)
    }

    /// Fills one column of `buffer` following the column layout rules.
    ///
    /// # Arguments
    /// * `buffer` - Chunk being generated
    /// * `local_x`, `local_z` - Column position inside the chunk
    /// * `world_x`, `world_z` - Column position in the world
    /// * `biome` - Profile of this column
    pub fn fill_column(
        &self,
        buffer: &mut ChunkBuffer,
        local_x: usize,
        local_z: usize,
        world_x: i32,
        world_z: i32,
        biome: &BiomeProfile,
    ) {
        let height = self.height_at(world_x, world_z);
        let top = (height as usize).min(buffer.dims().height - 1);

        for y in 0..=top {
            let y_i = y as i32;
            let block = if y == 0 {
                BlockType::BEDROCK
            } else if y_i == height {
                biome.surface_block
            } else if y_i >= height - biome.subsurface_depth {
                biome.subsurface_block
            } else {
                BlockType::STONE
            };
            buffer.set(local_x, y, local_z, block as BlockTypeSize);
        }
    }
}
