//! # Voxel World Engine Demo
//!
//! Headless entry point. It calls into the library's `run()` function, which
//! walks a viewer through a generated world and logs streaming statistics.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info VOXEL_WORLD_DIR=./world cargo run --release
//! ```

fn main() {
    voxel_world_engine::run();
}
