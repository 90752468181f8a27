//! # Engine State Module
//!
//! The chunked world engine and everything it is built from.
//!
//! ## Key Components
//!
//! * `chunk_manager` - The facade collaborators drive once per frame
//! * `camera_state` - The viewer abstraction and a camera implementing it
//! * `config` - Engine tunables loaded from JSON
//! * `error` - Error types of the subsystem boundaries
//! * `rendering` - Meshing, texture atlas and frustum culling
//! * `task_management` - Worker threads for chunk generation
//! * `voxels` - Block registry, chunk data, generation and persistence
//!
//! ## Architecture
//!
//! `ChunkManager` owns every other component and is the only writer of chunk
//! data and meshes. Background threads never see that state: generation
//! workers get plain values and return fresh buffers, and storage threads
//! share only the store and the persistence indexes.
//!
//! ## Performance Considerations
//!
//! * At most one chunk is finished per update, bounding per-frame cost
//! * Generation runs on worker threads when any are configured
//! * Stored records are read on background threads, coalesced per key
//! * Full visibility passes are throttled by viewer movement

pub mod camera_state;
pub mod chunk_manager;
pub mod config;
pub mod error;
pub mod rendering;
pub mod task_management;
pub mod voxels;

pub use chunk_manager::{ChunkCount, ChunkManager};
pub use config::WorldConfig;
