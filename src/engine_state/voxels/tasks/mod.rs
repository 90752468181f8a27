//! # Voxel Task System
//!
//! Tasks related to voxel world generation, run on the task manager's workers.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;
