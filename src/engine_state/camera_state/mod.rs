//! # Camera State Management
//!
//! This module provides the viewer abstraction the world engine consumes:
//! a world-space position for radius and priority computation, and a
//! view-projection matrix for frustum culling.
//!
//! ## Core Components
//! - `Viewer`: what the chunk manager needs to know about whoever is looking
//! - `Camera`: position and orientation in 3D space
//! - `Projection`: the camera's projection matrix
//! - `CameraState`: a camera and projection pair implementing `Viewer`

use cgmath::{Matrix4, Point3, Rad};

pub mod camera;

use camera::{Camera, Projection};

/// Whoever the world is streamed and culled for.
pub trait Viewer {
    /// Position in world space.
    fn position(&self) -> Point3<f32>;

    /// Horizontal rotation, used to throttle visibility passes.
    fn yaw(&self) -> Rad<f32>;

    /// Vertical rotation, used to throttle visibility passes.
    fn pitch(&self) -> Rad<f32>;

    /// Projection × view matrix, depth in [0, 1].
    fn view_projection(&self) -> Matrix4<f32>;
}

/// A camera with its projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: Camera,
    /// Projection settings
    pub projection: Projection,
}

impl CameraState {
    /// Pairs a camera with a projection.
    pub fn new(camera: Camera, projection: Projection) -> Self {
        Self { camera, projection }
    }
}

impl Viewer for CameraState {
    fn position(&self) -> Point3<f32> {
        self.camera.position
    }

    fn yaw(&self) -> Rad<f32> {
        self.camera.yaw
    }

    fn pitch(&self) -> Rad<f32> {
        self.camera.pitch
    }

    fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }
}
