//! # Block Entity Module
//!
//! Auxiliary per-coordinate state kept outside the voxel grid. The world engine
//! only ever asks one question of it: which way a directional block faces.

use std::collections::HashMap;

use crate::core::MtResource;

use super::block::block_side::Facing;

/// Read access to block entities, as needed by the mesh builder.
pub trait BlockEntityStore {
    /// Facing of the directional block entity at a world coordinate, if any.
    fn orientation(&self, x: i32, y: i32, z: i32) -> Option<Facing>;
}

/// Store used when no block entities exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBlockEntities;

impl BlockEntityStore for NoBlockEntities {
    fn orientation(&self, _x: i32, _y: i32, _z: i32) -> Option<Facing> {
        None
    }
}

/// Block entity orientations keyed by world coordinate.
#[derive(Debug, Default, Clone)]
pub struct BlockEntityMap {
    orientations: HashMap<(i32, i32, i32), Facing>,
}

impl BlockEntityMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the facing of the block entity at a coordinate.
    pub fn set_orientation(&mut self, x: i32, y: i32, z: i32, facing: Facing) {
        self.orientations.insert((x, y, z), facing);
    }

    /// Forgets the block entity at a coordinate.
    pub fn remove(&mut self, x: i32, y: i32, z: i32) -> Option<Facing> {
        self.orientations.remove(&(x, y, z))
    }

    /// Number of recorded block entities.
    pub fn len(&self) -> usize {
        self.orientations.len()
    }

    /// Whether no block entity is recorded.
    pub fn is_empty(&self) -> bool {
        self.orientations.is_empty()
    }
}

impl BlockEntityStore for BlockEntityMap {
    fn orientation(&self, x: i32, y: i32, z: i32) -> Option<Facing> {
        self.orientations.get(&(x, y, z)).copied()
    }
}

/// Lets the owner of a shared map keep editing it after handing a clone to
/// the world engine.
impl<T: BlockEntityStore + Send + Sync> BlockEntityStore for MtResource<T> {
    fn orientation(&self, x: i32, y: i32, z: i32) -> Option<Facing> {
        self.get().orientation(x, y, z)
    }
}
