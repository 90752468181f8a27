//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, the unit of work the
//! generation queue hands to worker threads when a chunk is neither resident
//! nor stored.

use crate::engine_state::{
    task_management::task::Task,
    voxels::{
        chunk::{ChunkBuffer, ChunkDimensions, ChunkKey},
        generation::WorldGenerator,
    },
};

/// A task that generates the contents of one chunk.
///
/// The task carries plain values only. The worker builds its own
/// [`WorldGenerator`] from them, so nothing is shared with the owner thread
/// while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGenerationTask {
    /// World seed
    pub seed: u32,
    /// Chunk X coordinate
    pub cx: i32,
    /// Chunk Z coordinate
    pub cz: i32,
    /// Horizontal chunk edge length
    pub chunk_size: usize,
    /// Vertical chunk extent
    pub chunk_height: usize,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `seed` - World seed
    /// * `key` - Chunk to generate
    /// * `dims` - Chunk layout
    pub fn new(seed: u32, key: ChunkKey, dims: ChunkDimensions) -> Self {
        ChunkGenerationTask {
            seed,
            cx: key.cx(),
            cz: key.cz(),
            chunk_size: dims.size,
            chunk_height: dims.height,
        }
    }

    /// Key of the chunk this task generates.
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.cx, self.cz)
    }
}

impl Task for ChunkGenerationTask {
    type Output = ChunkBuffer;

    /// Generates the chunk. Identical on a worker and on the owner thread.
    fn process(&self) -> ChunkBuffer {
        let dims = ChunkDimensions::new(self.chunk_size, self.chunk_height);
        WorldGenerator::new(self.seed, dims).generate_chunk(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::task_management::TaskManager;

    #[test]
    fn worker_output_matches_synchronous_generation() {
        let dims = ChunkDimensions::new(16, 64);
        let task = ChunkGenerationTask::new(42, ChunkKey::new(-2, 3), dims);
        let expected = WorldGenerator::new(42, dims).generate_chunk(ChunkKey::new(-2, 3));

        let mut manager = TaskManager::new(1);
        manager.publish_task(task);
        let outcome = loop {
            if let Some(outcome) = manager.poll_completed().pop() {
                break outcome;
            }
            std::thread::yield_now();
        };

        assert_eq!(outcome.task.key(), ChunkKey::new(-2, 3));
        assert_eq!(outcome.result.unwrap(), expected);
    }
}
