//! # Chunk Iteration Module
//!
//! This module provides an iterator over the non-air voxels of a chunk buffer.
//! Air makes up most of a typical chunk, so skipping it up front keeps the mesh
//! builder's inner loop short.

use cgmath::Point3;

use crate::engine_state::voxels::block::BlockTypeSize;

use super::ChunkBuffer;

/// An iterator over all non-air voxels in a chunk buffer.
///
/// Voxels are visited in buffer order (x fastest, then y, then z). Each item is
/// the chunk-local position together with the block id stored there.
pub struct ChunkBlockIterator<'a> {
    /// Reference to the chunk being iterated over
    chunk_ref: &'a ChunkBuffer,
    /// Next buffer index to inspect
    current_offset: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates a new `ChunkBlockIterator` positioned before the first voxel.
    pub fn new(chunk_ref: &'a ChunkBuffer) -> Self {
        ChunkBlockIterator {
            chunk_ref,
            current_offset: 0,
        }
    }
}

impl<'a> Iterator for ChunkBlockIterator<'a> {
    type Item = (Point3<usize>, BlockTypeSize);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.chunk_ref.as_bytes();

        // Scan ahead for the next solid byte
        let skipped = bytes[self.current_offset..]
            .iter()
            .position(|&id| id != 0)?;

        let index = self.current_offset + skipped;
        self.current_offset = index + 1;

        Some((self.chunk_ref.position_of(index), bytes[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::ChunkDimensions;

    #[test]
    fn visits_only_solid_voxels_in_buffer_order() {
        let mut buffer = ChunkBuffer::empty(ChunkDimensions::new(8, 16));
        buffer.set(1, 0, 0, 3);
        buffer.set(0, 2, 0, 4);
        buffer.set(7, 15, 7, 5);

        let visited: Vec<_> = buffer.iter_solid().collect();
        assert_eq!(
            visited,
            vec![
                (Point3::new(1, 0, 0), 3),
                (Point3::new(0, 2, 0), 4),
                (Point3::new(7, 15, 7), 5),
            ]
        );
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let buffer = ChunkBuffer::empty(ChunkDimensions::new(8, 16));
        assert_eq!(buffer.iter_solid().count(), 0);
    }
}
