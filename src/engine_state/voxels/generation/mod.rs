//! # Generation Module
//!
//! Procedural content for new chunks.
//!
//! ## Key Components
//! - `BiomeGenerator`: which biome profile applies to a column
//! - `TerrainGenerator`: height field and column fill
//! - `StructureGenerator`: ore veins and trees
//! - `WorldGenerator`: the three bundled into one total, deterministic
//!   `generate_chunk` used both on worker threads and on the owner thread
//!
//! Generation holds no references into world state. Everything it needs is the
//! seed and the chunk dimensions, so a worker can rebuild a `WorldGenerator` from
//! those alone and produce exactly the buffer the owner thread would.

pub mod biome;
pub mod structures;
pub mod terrain;

use log::debug;
use web_time::Instant;

use super::chunk::{ChunkBuffer, ChunkDimensions, ChunkKey};

pub use biome::{BiomeGenerator, BiomeProfile};
pub use structures::StructureGenerator;
pub use terrain::TerrainGenerator;

/// Terrain plus structures for one seed and chunk layout.
#[derive(Debug, Clone)]
pub struct WorldGenerator {
    dims: ChunkDimensions,
    terrain: TerrainGenerator,
    structures: StructureGenerator,
}

impl WorldGenerator {
    /// Creates a generator for `seed` producing chunks of the given dimensions.
    pub fn new(seed: u32, dims: ChunkDimensions) -> Self {
        Self {
            dims,
            terrain: TerrainGenerator::new(seed, dims.height),
            structures: StructureGenerator::new(seed),
        }
    }

    /// Current seed.
    pub fn seed(&self) -> u32 {
        self.terrain.seed()
    }

    /// Reseeds terrain, biomes and structures together.
    pub fn set_seed(&mut self, seed: u32) {
        self.terrain.set_seed(seed);
        self.structures.set_seed(seed);
    }

    /// Dimensions of the chunks this generator produces.
    pub fn dims(&self) -> ChunkDimensions {
        self.dims
    }

    /// The terrain generator, e.g. for surface height queries on unloaded chunks.
    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    /// Generates the full contents of one chunk.
    ///
    /// # Arguments
    /// * `key` - Chunk to generate
    ///
    /// # Returns
    /// A fresh buffer; the same seed and key always give identical bytes.
    pub fn generate_chunk(&self, key: ChunkKey) -> ChunkBuffer {
        let start = Instant::now();
        let mut buffer = ChunkBuffer::empty(self.dims);
        let (origin_x, origin_z) = self.dims.origin(key);

        for z in 0..self.dims.size {
            for x in 0..self.dims.size {
                let world_x = origin_x + x as i32;
                let world_z = origin_z + z as i32;
                let biome = self.terrain.biomes().biome_at(world_x, world_z);
                self.terrain
                    .fill_column(&mut buffer, x, z, world_x, world_z, biome);
            }
        }

        self.structures.decorate(&mut buffer, key, &self.terrain);

        debug!("generated chunk {} in {:?}", key, start.elapsed());
        buffer
    }
}
