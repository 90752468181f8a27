//! # Voxel World
//!
//! This module contains the data side of the world engine: representing,
//! generating, editing and persisting an unbounded voxel grid as chunk columns.
//!
//! ## Architecture
//!
//! * **Block**: block ids, faces and the per-face appearance table
//! * **Chunk**: chunk keys, dimensions and dense block buffers
//! * **Generation**: biome, terrain and structure passes
//! * **Chunk data**: resident buffers and their dirty revisions
//! * **Persistence**: the key-value store and coalesced background I/O
//! * **Generation queue**: resolves missing chunks from storage or generation
//! * **Tasks**: generation work handed to worker threads
//!
//! ## Data Flow
//!
//! 1. The chunk manager enqueues chunks missing around the viewer
//! 2. The generation queue loads each from storage or generates it
//! 3. The finished buffer lands in the chunk data manager and is meshed
//! 4. Edits mark buffers dirty until persistence reports them saved
//!
//! ## Thread Safety
//!
//! Only the owner thread touches resident buffers. Workers receive plain
//! values and hand back fresh buffers, and storage threads share nothing but
//! the store and the persistence indexes.

pub mod block;
pub mod block_entity;
pub mod chunk;
pub mod chunk_data;
pub mod generation;
pub mod generation_queue;
pub mod persistence;
pub mod tasks;
