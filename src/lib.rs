#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World Engine
//!
//! A chunked voxel world: an effectively unbounded grid of blocks streamed in
//! fixed-size columns around a viewer, generated procedurally, persisted to a
//! key-value store, and turned into meshes a renderer can upload.
//!
//! ## Key Modules
//!
//! * `core` - Concurrency primitives shared with background threads
//! * `engine_state` - The world engine: chunk data, generation, persistence,
//!   meshing, culling and the `ChunkManager` facade
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use cgmath::Point3;
//! use voxel_world_engine::engine_state::{
//!     voxels::{block_entity::NoBlockEntities, persistence::MemoryStore},
//!     ChunkManager, WorldConfig,
//! };
//!
//! let config = WorldConfig { render_distance: 1, worker_count: Some(0), ..WorldConfig::default() };
//! let mut world =
//!     ChunkManager::open(config, Arc::new(MemoryStore::new()), Box::new(NoBlockEntities)).unwrap();
//! for _ in 0..9 {
//!     world.update(Point3::new(0.0, 64.0, 0.0));
//! }
//! assert_eq!(world.get_chunk_count().total, 9);
//! ```

use std::{env, path::PathBuf, sync::Arc};

use cgmath::{Deg, Point3};
use log::{error, info};
use web_time::Instant;

use engine_state::{
    camera_state::{
        camera::{Camera, Projection},
        CameraState,
    },
    voxels::{
        block_entity::NoBlockEntities,
        persistence::{DirectoryStore, KeyValueStore, MemoryStore},
    },
    ChunkManager, WorldConfig,
};

pub mod core;
pub mod engine_state;

/// Number of frames the headless demo walks the viewer for.
const DEMO_FRAMES: usize = 600;

/// Runs a headless walk through a world and logs what the engine does.
///
/// `VOXEL_CONFIG` names an optional JSON config file and `VOXEL_WORLD_DIR` an
/// optional directory to persist the world in; without it the world lives in
/// memory. Logging follows `RUST_LOG`.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match env::var("VOXEL_CONFIG") {
        Ok(path) => match WorldConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}; using defaults", e);
                WorldConfig::default()
            }
        },
        Err(_) => WorldConfig::default(),
    };

    let store: Arc<dyn KeyValueStore> = match env::var("VOXEL_WORLD_DIR") {
        Ok(dir) => Arc::new(DirectoryStore::new(PathBuf::from(dir))),
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let mut world = match ChunkManager::open(config, store, Box::new(NoBlockEntities)) {
        Ok(world) => world,
        Err(e) => {
            error!("could not open world: {}", e);
            return;
        }
    };
    world.wait_for_chunk(0, 0);
    let spawn_y = world.get_top_y(0, 0) as f32 + 2.0;
    info!("spawning at y = {}", spawn_y);

    let mut viewer = CameraState::new(
        Camera::new(Point3::new(0.5, spawn_y, 0.5), Deg(0.0), Deg(-10.0)),
        Projection::new(1280, 720, Deg(70.0), 0.1, 1000.0),
    );

    let start = Instant::now();
    for frame in 0..DEMO_FRAMES {
        viewer.camera.position.x += 0.5;
        viewer.camera.rotate(Deg(0.1), Deg(0.0));

        world.update(viewer.camera.position);
        world.update_visibility(&viewer);
        world.drain_mesh_commands();

        if frame % 100 == 0 {
            let count = world.get_chunk_count();
            info!(
                "frame {}: {} chunks resident, {} visible, {} pending, {} dirty",
                frame,
                count.total,
                count.visible,
                world.pending_count(),
                world.dirty_count()
            );
        }
    }

    let saved = world.flush();
    info!(
        "walked {} frames in {:?}, saved {} chunks on exit",
        DEMO_FRAMES,
        start.elapsed(),
        saved
    );
}
