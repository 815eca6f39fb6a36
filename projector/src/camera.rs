use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

use crate::ProjectionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

/// Image-plane corners in camera-local space, ordered top-right,
/// bottom-right, bottom-left, top-left. The camera looks down its local -Z,
/// so every corner has a negative z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewFrame {
    corners: [Point3<f64>; 4],
}

impl ViewFrame {
    pub fn from_corners(corners: [Point3<f64>; 4]) -> Self {
        Self { corners }
    }

    /// Frame of a pinhole camera. The longer image side spans one unit at a
    /// depth of `lens / sensor`.
    pub fn perspective(lens_mm: f64, sensor_mm: f64, width: u32, height: u32) -> Self {
        let (half_w, half_h) = half_extents(0.5, width, height);
        Self::centered(half_w, half_h, -lens_mm / sensor_mm)
    }

    pub fn orthographic(ortho_scale: f64, width: u32, height: u32) -> Self {
        let (half_w, half_h) = half_extents(0.5 * ortho_scale, width, height);
        Self::centered(half_w, half_h, -1.0)
    }

    fn centered(half_w: f64, half_h: f64, depth: f64) -> Self {
        Self::from_corners([
            Point3::new(half_w, half_h, depth),
            Point3::new(half_w, -half_h, depth),
            Point3::new(-half_w, -half_h, depth),
            Point3::new(-half_w, half_h, depth),
        ])
    }

    pub fn corners(&self) -> &[Point3<f64>; 4] {
        &self.corners
    }
}

fn half_extents(half: f64, width: u32, height: u32) -> (f64, f64) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    if w >= h {
        (half, half * h / w)
    } else {
        (half * w / h, half)
    }
}

/// Everything the projector needs to know about a camera.
#[derive(Clone, Debug)]
pub struct CameraView {
    inverse_world: Matrix4<f64>,
    frame: ViewFrame,
    projection: Projection,
}

impl CameraView {
    /// Builds the view from the camera's world matrix. Scale is stripped
    /// from the rotation columns before inverting.
    pub fn new(
        world: &Matrix4<f64>,
        frame: ViewFrame,
        projection: Projection,
    ) -> Result<Self, ProjectionError> {
        let inverse_world = normalized(world)
            .try_inverse()
            .ok_or(ProjectionError::SingularTransform)?;
        Ok(Self::from_inverse(inverse_world, frame, projection))
    }

    fn from_inverse(
        inverse_world: Matrix4<f64>,
        frame: ViewFrame,
        projection: Projection,
    ) -> Self {
        Self {
            inverse_world,
            frame,
            projection,
        }
    }

    pub fn to_camera_space(&self, point: &Point3<f64>) -> Point3<f64> {
        self.inverse_world.transform_point(point)
    }

    pub fn frame(&self) -> &ViewFrame {
        &self.frame
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }
}

fn normalized(world: &Matrix4<f64>) -> Matrix4<f64> {
    let mut m = *world;
    for i in 0..3 {
        let mut axis = m.fixed_view_mut::<3, 1>(0, i);
        let norm = axis.norm();
        if norm > 0.0 {
            axis /= norm;
        }
    }
    m
}
