//! # Structures Module
//!
//! Post-processing passes that run over a terrain-filled chunk buffer:
//! ore veins carved into stone, then trees planted on the surface.
//!
//! Both passes draw from a [`fastrand::Rng`] seeded from `(seed, cx, cz)`, so
//! regenerating a chunk reproduces it byte for byte. Ores run first because
//! they only replace stone; trees only ever write into air.

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, block_type::BlockType, BlockTypeSize},
    chunk::{ChunkBuffer, ChunkKey},
};

use super::terrain::TerrainGenerator;

/// Consecutive blocked steps after which an ore walk gives up.
const MAX_VEIN_FAILURES: u32 = 10;

/// Probability that a canopy corner voxel is left out.
const CANOPY_CORNER_SKIP: f32 = 0.4;

/// One ore and how it is scattered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OreSpec {
    /// Block the vein is made of.
    pub block: BlockType,
    /// Vein placement trials per chunk.
    pub attempts: u32,
    /// Maximum number of voxels in one vein.
    pub vein_size: u32,
    /// Highest y at which a vein may start.
    pub max_height: i32,
}

/// Default ore table, most to least common.
pub const ORE_TABLE: [OreSpec; 4] = [
    OreSpec {
        block: BlockType::COAL_ORE,
        attempts: 20,
        vein_size: 8,
        max_height: 96,
    },
    OreSpec {
        block: BlockType::IRON_ORE,
        attempts: 12,
        vein_size: 6,
        max_height: 64,
    },
    OreSpec {
        block: BlockType::GOLD_ORE,
        attempts: 4,
        vein_size: 5,
        max_height: 32,
    },
    OreSpec {
        block: BlockType::DIAMOND_ORE,
        attempts: 2,
        vein_size: 4,
        max_height: 16,
    },
];

/// Tree shape parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSpec {
    /// Shortest trunk in blocks.
    pub min_trunk: u32,
    /// Tallest trunk in blocks.
    pub max_trunk: u32,
    /// Columns this close to a chunk edge never grow trees, keeping canopies in-chunk.
    pub edge_margin: usize,
}

impl Default for TreeSpec {
    fn default() -> Self {
        Self {
            min_trunk: 4,
            max_trunk: 6,
            edge_margin: 2,
        }
    }
}

/// Places ores and trees into generated chunks.
#[derive(Debug, Clone)]
pub struct StructureGenerator {
    seed: u32,
    ores: Vec<OreSpec>,
    trees: TreeSpec,
}

impl StructureGenerator {
    /// Creates a structure generator with the default ore table and tree shape.
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            ores: ORE_TABLE.to_vec(),
            trees: TreeSpec::default(),
        }
    }

    /// Current seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Changes the seed used for per-chunk randomness.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Random source for one chunk, identical on every run for the same seed.
    pub fn chunk_rng(&self, key: ChunkKey) -> fastrand::Rng {
        fastrand::Rng::with_seed(mix_seed(self.seed, key))
    }

    /// Runs the ore pass and then the tree pass over `buffer`.
    pub fn decorate(&self, buffer: &mut ChunkBuffer, key: ChunkKey, terrain: &TerrainGenerator) {
        let mut rng = self.chunk_rng(key);
        self.place_ores(buffer, key, terrain, &mut rng);
        self.place_trees(buffer, key, terrain, &mut rng);
    }

    /// Carves ore veins into the stone of `buffer`.
    ///
    /// Each trial picks a random column, starts the vein somewhere in
    /// `[1, surface - 3]` (capped by the ore's maximum height) and, if the start
    /// voxel is stone, grows it by a six-directional random walk that only moves
    /// on a successful placement.
    pub fn place_ores(
        &self,
        buffer: &mut ChunkBuffer,
        key: ChunkKey,
        terrain: &TerrainGenerator,
        rng: &mut fastrand::Rng,
    ) {
        let dims = buffer.dims();
        let (origin_x, origin_z) = dims.origin(key);
        let stone = BlockType::STONE as BlockTypeSize;

        for ore in &self.ores {
            let ore_id = ore.block as BlockTypeSize;

            for _ in 0..ore.attempts {
                let x = rng.usize(0..dims.size);
                let z = rng.usize(0..dims.size);
                let surface = terrain.height_at(origin_x + x as i32, origin_z + z as i32);
                let ceiling = (surface - 3).min(ore.max_height);
                if ceiling < 1 {
                    continue;
                }
                let y = rng.i32(1..=ceiling) as usize;

                if buffer.get(x, y, z) != stone {
                    continue;
                }
                buffer.set(x, y, z, ore_id);

                let mut cursor = (x as i32, y as i32, z as i32);
                let mut placed = 1;
                let mut failures = 0;
                while placed < ore.vein_size && failures < MAX_VEIN_FAILURES {
                    let (dx, dy, dz) = BlockSide::all()[rng.usize(0..6)].offset();
                    let next = (cursor.0 + dx, cursor.1 + dy, cursor.2 + dz);

                    if next.1 >= 1 && buffer.get_checked(next.0, next.1, next.2) == Some(stone) {
                        buffer.set(next.0 as usize, next.1 as usize, next.2 as usize, ore_id);
                        cursor = next;
                        placed += 1;
                        failures = 0;
                    } else {
                        failures += 1;
                    }
                }
            }
        }
    }

    /// Plants trees on surface columns away from the chunk edges.
    ///
    /// A tree needs its column's top voxel to be the biome surface block, a
    /// successful draw against the biome's tree chance, and a trunk column of
    /// air. The canopy spans the top four layers around the trunk tip: radius 2
    /// on the lower two, radius 1 on the upper two, with corners randomly left
    /// out. Leaves are only written into air.
    pub fn place_trees(
        &self,
        buffer: &mut ChunkBuffer,
        key: ChunkKey,
        terrain: &TerrainGenerator,
        rng: &mut fastrand::Rng,
    ) {
        let dims = buffer.dims();
        let margin = self.trees.edge_margin;
        if dims.size <= margin * 2 {
            return;
        }
        let (origin_x, origin_z) = dims.origin(key);

        for z in margin..dims.size - margin {
            for x in margin..dims.size - margin {
                let Some(top) = buffer.top_y(x, z) else {
                    continue;
                };
                let biome = terrain
                    .biomes()
                    .biome_at(origin_x + x as i32, origin_z + z as i32);
                if buffer.get(x, top, z) != biome.surface_block as BlockTypeSize {
                    continue;
                }
                if rng.f32() >= biome.tree_chance {
                    continue;
                }

                let trunk = rng.u32(self.trees.min_trunk..=self.trees.max_trunk) as usize;
                // Trunk tip plus one canopy layer above it must fit
                if top + trunk + 1 >= dims.height {
                    continue;
                }
                if (top + 1..=top + trunk).any(|y| buffer.get(x, y, z) != 0) {
                    continue;
                }

                for y in top + 1..=top + trunk {
                    buffer.set(x, y, z, BlockType::LOG as BlockTypeSize);
                }
                self.place_canopy(buffer, x, top + trunk, z, rng);
            }
        }
    }

    fn place_canopy(
        &self,
        buffer: &mut ChunkBuffer,
        x: usize,
        tip: usize,
        z: usize,
        rng: &mut fastrand::Rng,
    ) {
        let leaves = BlockType::LEAVES as BlockTypeSize;
        let layers: [(usize, i32); 4] = [(tip - 2, 2), (tip - 1, 2), (tip, 1), (tip + 1, 1)];

        for (y, radius) in layers {
            for dz in -radius..=radius {
                for dx in -radius..=radius {
                    let corner = dx.abs() == radius && dz.abs() == radius;
                    if corner && rng.f32() < CANOPY_CORNER_SKIP {
                        continue;
                    }
                    let lx = x as i32 + dx;
                    let lz = z as i32 + dz;
                    if buffer.get_checked(lx, y as i32, lz) == Some(0) {
                        buffer.set(lx as usize, y, lz as usize, leaves);
                    }
                }
            }
        }
    }
}

/// Mixes the world seed and chunk key into one 64-bit RNG seed (splitmix64 finalizer).
fn mix_seed(seed: u32, key: ChunkKey) -> u64 {
    let mut z = key.raw() ^ (seed as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
