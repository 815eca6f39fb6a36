//! Capability interface of the 3D application driven by the generators.
//!
//! Every call is synchronous. After a call returns, world-space vertices and
//! the camera view reflect it.

use std::path::Path;

use anyhow::Result;
use nalgebra::{Point3, Vector3};
use projector::{BoundingBox, CameraView, image_bounding_box};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightHandle(pub usize);

/// Linear color, each channel in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb(pub [f64; 3]);

impl Rgb {
    pub fn from_u8(rgb: [u8; 3]) -> Self {
        Self(rgb.map(|c| f64::from(c) / 255.0))
    }

    pub fn to_u8(self) -> [u8; 3] {
        self.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Pixel size pushed to the host once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub resolution: (u32, u32),
    pub resolution_percentage: u32,
}

impl RenderSettings {
    pub fn pixel_size(&self) -> (u32, u32) {
        let scale = |v: u32| {
            let scaled = u64::from(v) * u64::from(self.resolution_percentage) / 100;
            u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
        };
        (scale(self.resolution.0), scale(self.resolution.1))
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: (500, 500),
            resolution_percentage: 100,
        }
    }
}

pub trait SceneHost {
    fn configure_render(&mut self, settings: RenderSettings) -> Result<()>;

    /// Imports a mesh with its origin on its lowest point, placed at the
    /// world origin.
    fn import_mesh(&mut self, path: &Path, name: &str) -> Result<ObjectHandle>;

    /// `delta_rotation` (XYZ Euler, radians) composes with the object's base
    /// orientation; `location` replaces the current position.
    fn set_object_transform(
        &mut self,
        object: ObjectHandle,
        delta_rotation: Option<Vector3<f64>>,
        location: Option<Point3<f64>>,
    ) -> Result<()>;

    fn add_point_light(&mut self, position: Point3<f64>, energy: f64) -> Result<LightHandle>;

    fn set_camera_position(&mut self, position: Point3<f64>) -> Result<()>;

    /// Positive `delta` moves toward the look direction.
    fn move_camera_along_view(&mut self, delta: f64) -> Result<()>;

    fn point_camera_at(&mut self, target: Point3<f64>) -> Result<()>;

    /// Moves the camera so every given object is in view.
    fn frame_objects(&mut self, objects: &[ObjectHandle]) -> Result<()>;

    fn set_background_image(&mut self, path: &Path) -> Result<()>;

    fn set_background_color(&mut self, rgb: Rgb) -> Result<()>;

    fn set_material_color(&mut self, object: ObjectHandle, rgb: Rgb) -> Result<()>;

    fn render_to_file(&mut self, path: &Path) -> Result<()>;

    /// Drops every mesh and light. Camera and render settings survive.
    fn reset_scene(&mut self) -> Result<()>;

    fn world_vertices(&self, object: ObjectHandle) -> Result<Vec<Point3<f64>>>;

    fn camera_view(&self) -> Result<CameraView>;
}

/// Normalized box of one object as the camera currently sees it.
pub fn object_bounding_box<H: SceneHost + ?Sized>(
    host: &H,
    object: ObjectHandle,
) -> Result<BoundingBox> {
    let vertices = host.world_vertices(object)?;
    let camera = host.camera_view()?;
    Ok(image_bounding_box(&vertices, &camera))
}
