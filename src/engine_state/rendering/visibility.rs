//! # Chunk Visibility
//!
//! Frustum culling of resident chunks against the viewer's view-projection.
//!
//! Each chunk's world-space bounding box is computed once when the chunk is
//! (re)loaded and cached by key. A full pass over every resident chunk only
//! runs when the viewer has turned or moved past a threshold since the last
//! pass.

use std::collections::{HashMap, HashSet};

use cgmath::{InnerSpace, Matrix4, MetricSpace, Point3, Rad, Vector3, Vector4};
use log::debug;

use crate::engine_state::{
    camera_state::Viewer,
    voxels::chunk::{ChunkDimensions, ChunkKey},
};

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3<f32>,
    /// Maximum corner
    pub max: Point3<f32>,
}

impl Aabb {
    /// Full-height box of the chunk column at `key`.
    pub fn for_chunk(dims: ChunkDimensions, key: ChunkKey) -> Self {
        let (ox, oz) = dims.origin(key);
        let size = dims.size as f32;
        Self {
            min: Point3::new(ox as f32, 0.0, oz as f32),
            max: Point3::new(ox as f32 + size, dims.height as f32, oz as f32 + size),
        }
    }
}

/// Six clip planes, each stored as `(normal, distance)` with normals pointing
/// into the frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vector4<f32>; 6],
}

impl Frustum {
    /// Extracts the clip planes from a view-projection matrix whose clip space
    /// depth runs from 0 to 1.
    ///
    /// # Arguments
    /// * `m` - Projection × view matrix
    ///
    /// # Returns
    /// Planes in the order left, right, bottom, top, near, far.
    pub fn from_matrix(m: Matrix4<f32>) -> Self {
        let row = |i: usize| Vector4::new(m.x[i], m.y[i], m.z[i], m.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let mut planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
        for plane in planes.iter_mut() {
            let length = plane.truncate().magnitude();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// Returns `true` unless the box lies entirely outside one of the planes.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal.
            let corner = Vector3::new(
                if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.truncate().dot(corner) + plane.w >= 0.0
        })
    }
}

/// Tracks which resident chunks the viewer can see.
#[derive(Debug)]
pub struct ChunkVisibility {
    dims: ChunkDimensions,
    frustum: Option<Frustum>,
    bounds: HashMap<ChunkKey, Aabb>,
    visible: HashSet<ChunkKey>,
    last_pass: Option<(Point3<f32>, Rad<f32>, Rad<f32>)>,
    rotation_threshold: f32,
    movement_threshold: f32,
}

impl ChunkVisibility {
    /// Creates an empty tracker.
    ///
    /// # Arguments
    /// * `dims` - Chunk dimensions used to size bounding boxes
    /// * `rotation_threshold` - Radians of yaw or pitch change that force a full pass
    /// * `movement_threshold` - Blocks of movement that force a full pass
    pub fn new(dims: ChunkDimensions, rotation_threshold: f32, movement_threshold: f32) -> Self {
        Self {
            dims,
            frustum: None,
            bounds: HashMap::new(),
            visible: HashSet::new(),
            last_pass: None,
            rotation_threshold,
            movement_threshold,
        }
    }

    /// Whether the viewer changed enough since the last full pass.
    pub fn needs_full_pass(&self, viewer: &dyn Viewer) -> bool {
        let Some((position, yaw, pitch)) = self.last_pass else {
            return true;
        };
        let turned = (viewer.yaw() - yaw).0.abs() > self.rotation_threshold
            || (viewer.pitch() - pitch).0.abs() > self.rotation_threshold;
        let moved = viewer.position().distance(position) > self.movement_threshold;
        turned || moved
    }

    /// Runs a full visibility pass over `keys` if the viewer changed enough.
    ///
    /// # Returns
    /// `true` if a pass ran.
    pub fn update<I>(&mut self, viewer: &dyn Viewer, keys: I) -> bool
    where
        I: IntoIterator<Item = ChunkKey>,
    {
        if !self.needs_full_pass(viewer) {
            return false;
        }
        self.full_pass(viewer, keys);
        true
    }

    /// Recomputes the frustum and the visible set regardless of thresholds.
    pub fn full_pass<I>(&mut self, viewer: &dyn Viewer, keys: I)
    where
        I: IntoIterator<Item = ChunkKey>,
    {
        let frustum = Frustum::from_matrix(viewer.view_projection());
        self.frustum = Some(frustum);
        self.last_pass = Some((viewer.position(), viewer.yaw(), viewer.pitch()));

        self.visible.clear();
        for key in keys {
            let dims = self.dims;
            let aabb = *self
                .bounds
                .entry(key)
                .or_insert_with(|| Aabb::for_chunk(dims, key));
            if frustum.intersects(&aabb) {
                self.visible.insert(key);
            }
        }
        debug!("Visibility pass: {} chunks visible", self.visible.len());
    }

    /// Caches the bounds of a freshly (re)loaded chunk and classifies it
    /// against the current frustum.
    pub fn chunk_loaded(&mut self, key: ChunkKey) {
        let aabb = Aabb::for_chunk(self.dims, key);
        self.bounds.insert(key, aabb);
        let visible = self.frustum.map_or(true, |frustum| frustum.intersects(&aabb));
        if visible {
            self.visible.insert(key);
        } else {
            self.visible.remove(&key);
        }
    }

    /// Tests a chunk against the current frustum.
    ///
    /// Before the first pass every chunk counts as visible.
    pub fn is_chunk_visible(&self, key: ChunkKey) -> bool {
        let Some(frustum) = &self.frustum else {
            return true;
        };
        let aabb = self
            .bounds
            .get(&key)
            .copied()
            .unwrap_or_else(|| Aabb::for_chunk(self.dims, key));
        frustum.intersects(&aabb)
    }

    /// Forgets the cached bounds of an unloaded chunk.
    pub fn clear_bounds(&mut self, key: ChunkKey) {
        self.bounds.remove(&key);
        self.visible.remove(&key);
    }

    /// Keys found visible by the latest pass.
    pub fn visible(&self) -> &HashSet<ChunkKey> {
        &self.visible
    }

    /// Number of chunks found visible by the latest pass.
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Number of cached bounding boxes.
    pub fn cached_bounds(&self) -> usize {
        self.bounds.len()
    }

    /// Drops every cached box and forces the next update to run a full pass.
    pub fn clear(&mut self) {
        self.frustum = None;
        self.bounds.clear();
        self.visible.clear();
        self.last_pass = None;
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;
    use crate::engine_state::camera_state::{
        camera::{Camera, Projection},
        CameraState,
    };

    fn viewer_at(x: f32, yaw: f32) -> CameraState {
        CameraState::new(
            Camera::new(Point3::new(x, 64.0, 16.0), Deg(yaw), Deg(0.0)),
            Projection::new(1280, 720, Deg(70.0), 0.1, 1000.0),
        )
    }

    #[test]
    fn chunks_behind_the_viewer_are_culled() {
        let mut visibility = ChunkVisibility::new(ChunkDimensions::default(), 0.05, 2.0);
        let viewer = viewer_at(0.0, 0.0);
        let ahead = ChunkKey::new(2, 0);
        let behind = ChunkKey::new(-3, 0);

        assert!(visibility.update(&viewer, [ahead, behind]));
        assert!(visibility.is_chunk_visible(ahead));
        assert!(!visibility.is_chunk_visible(behind));
        assert_eq!(visibility.visible_count(), 1);
        assert_eq!(visibility.cached_bounds(), 2);
    }

    #[test]
    fn small_changes_do_not_trigger_a_pass() {
        let mut visibility = ChunkVisibility::new(ChunkDimensions::default(), 0.05, 2.0);
        assert!(visibility.update(&viewer_at(0.0, 0.0), [ChunkKey::new(1, 0)]));
        assert!(!visibility.update(&viewer_at(1.0, 1.0), [ChunkKey::new(1, 0)]));
        assert!(visibility.update(&viewer_at(3.0, 1.0), [ChunkKey::new(1, 0)]));
        assert!(visibility.update(&viewer_at(3.0, 10.0), [ChunkKey::new(1, 0)]));
    }

    #[test]
    fn clear_bounds_forgets_the_chunk() {
        let mut visibility = ChunkVisibility::new(ChunkDimensions::default(), 0.05, 2.0);
        let key = ChunkKey::new(1, 0);
        visibility.full_pass(&viewer_at(0.0, 0.0), [key]);
        assert!(visibility.visible().contains(&key));

        visibility.clear_bounds(key);
        assert_eq!(visibility.cached_bounds(), 0);
        assert_eq!(visibility.visible_count(), 0);
    }

    #[test]
    fn everything_is_visible_before_the_first_pass() {
        let visibility = ChunkVisibility::new(ChunkDimensions::default(), 0.05, 2.0);
        assert!(visibility.is_chunk_visible(ChunkKey::new(-50, 50)));
    }
}
