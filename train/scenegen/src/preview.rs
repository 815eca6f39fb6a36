//! Headless software host.
//!
//! Renders the backdrop and, for each object, its projected silhouette box
//! filled with the object's color dimmed by the total lamp energy. Good
//! enough to check a dataset's layout and labels without a 3D application.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use image::{Rgb as Pixel, RgbImage, imageops::FilterType};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use log::debug;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use projector::{CameraView, Projection, ViewFrame, image_bounding_box};
use serde::{Deserialize, Serialize};

use crate::{
    host::{LightHandle, ObjectHandle, RenderSettings, Rgb, SceneHost},
    mesh::load_obj_vertices,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub location: Point3<f64>,
    /// XYZ Euler angles, radians.
    pub rotation: Vector3<f64>,
    pub lens: f64,
    pub sensor_width: f64,
    pub projection: Projection,
    pub ortho_scale: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            location: Point3::new(7.3589, -6.9258, 4.9583),
            rotation: Vector3::new(63.559_f64.to_radians(), 0.0, 46.692_f64.to_radians()),
            lens: 50.0,
            sensor_width: 36.0,
            projection: Projection::Perspective,
            ortho_scale: 7.0,
        }
    }
}

impl CameraState {
    fn rotation_matrix(&self) -> Rotation3<f64> {
        let r = self.rotation;
        Rotation3::from_euler_angles(r.x, r.y, r.z)
    }

    fn forward(&self) -> Vector3<f64> {
        self.rotation_matrix() * -Vector3::z()
    }

    fn world_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.location.coords) * self.rotation_matrix().to_homogeneous()
    }

    fn view_frame(&self, (width, height): (u32, u32)) -> ViewFrame {
        match self.projection {
            Projection::Perspective => {
                ViewFrame::perspective(self.lens, self.sensor_width, width, height)
            }
            Projection::Orthographic => ViewFrame::orthographic(self.ortho_scale, width, height),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backdrop {
    Color { rgb: Rgb },
    Image { path: PathBuf },
}

/// What survives a scene reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SceneState {
    camera: CameraState,
    render: RenderSettings,
    backdrop: Backdrop,
}

struct MeshObject {
    name: String,
    vertices: Vec<Point3<f64>>,
    location: Point3<f64>,
    delta_rotation: Vector3<f64>,
    color: Rgb,
}

impl MeshObject {
    fn world_vertices(&self) -> Vec<Point3<f64>> {
        let r = self.delta_rotation;
        let rotation = Rotation3::from_euler_angles(r.x, r.y, r.z);
        self.vertices
            .iter()
            .map(|v| self.location + rotation * v.coords)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Point3<f64>,
    pub energy: f64,
}

pub struct PreviewHost {
    checkpoint: PathBuf,
    state: SceneState,
    objects: Vec<MeshObject>,
    lights: Vec<PointLight>,
}

impl PreviewHost {
    /// `checkpoint` is the scene file written and reloaded on every reset.
    pub fn new(checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            state: SceneState {
                camera: CameraState::default(),
                render: RenderSettings::default(),
                backdrop: Backdrop::Color {
                    rgb: Rgb([0.05, 0.05, 0.05]),
                },
            },
            objects: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn with_camera(mut self, camera: CameraState) -> Self {
        self.state.camera = camera;
        self
    }

    pub fn camera(&self) -> &CameraState {
        &self.state.camera
    }

    pub fn backdrop(&self) -> &Backdrop {
        &self.state.backdrop
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    fn object(&self, handle: ObjectHandle) -> Result<&MeshObject> {
        self.objects
            .get(handle.0)
            .ok_or_else(|| anyhow!("object {} is not in the scene", handle.0))
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Result<&mut MeshObject> {
        self.objects
            .get_mut(handle.0)
            .ok_or_else(|| anyhow!("object {} is not in the scene", handle.0))
    }

    fn save_checkpoint(&self) -> Result<()> {
        if let Some(parent) = self.checkpoint.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.checkpoint)
            .with_context(|| format!("writing checkpoint {}", self.checkpoint.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.state)?;
        Ok(())
    }

    fn open_checkpoint(&mut self) -> Result<()> {
        let file = File::open(&self.checkpoint)
            .with_context(|| format!("reading checkpoint {}", self.checkpoint.display()))?;
        self.state = serde_json::from_reader(BufReader::new(file))?;
        Ok(())
    }

    fn draw_backdrop(&self, (width, height): (u32, u32)) -> Result<RgbImage> {
        match &self.state.backdrop {
            Backdrop::Color { rgb } => Ok(RgbImage::from_pixel(width, height, Pixel(rgb.to_u8()))),
            Backdrop::Image { path } => {
                let image = image::open(path)
                    .with_context(|| format!("opening backdrop {}", path.display()))?
                    .to_rgb8();
                Ok(image::imageops::resize(
                    &image,
                    width,
                    height,
                    FilterType::Triangle,
                ))
            }
        }
    }

    fn shade(&self) -> f64 {
        let energy: f64 = self.lights.iter().map(|l| l.energy).sum();
        0.4 + 0.6 * energy / (energy + 5.0)
    }
}

impl SceneHost for PreviewHost {
    fn configure_render(&mut self, settings: RenderSettings) -> Result<()> {
        self.state.render = settings;
        Ok(())
    }

    fn import_mesh(&mut self, path: &Path, name: &str) -> Result<ObjectHandle> {
        let mut vertices = load_obj_vertices(path)?;
        let lowest = vertices
            .iter()
            .map(|v| v.z)
            .fold(f64::INFINITY, f64::min);
        for v in vertices.iter_mut() {
            v.z -= lowest;
        }
        debug!("imported {name} from {} ({} vertices)", path.display(), vertices.len());
        self.objects.push(MeshObject {
            name: name.to_string(),
            vertices,
            location: Point3::origin(),
            delta_rotation: Vector3::zeros(),
            color: Rgb([0.8, 0.8, 0.8]),
        });
        Ok(ObjectHandle(self.objects.len() - 1))
    }

    fn set_object_transform(
        &mut self,
        object: ObjectHandle,
        delta_rotation: Option<Vector3<f64>>,
        location: Option<Point3<f64>>,
    ) -> Result<()> {
        let obj = self.object_mut(object)?;
        if let Some(r) = delta_rotation {
            obj.delta_rotation = r;
        }
        if let Some(l) = location {
            obj.location = l;
        }
        Ok(())
    }

    fn add_point_light(&mut self, position: Point3<f64>, energy: f64) -> Result<LightHandle> {
        self.lights.push(PointLight { position, energy });
        Ok(LightHandle(self.lights.len() - 1))
    }

    fn set_camera_position(&mut self, position: Point3<f64>) -> Result<()> {
        self.state.camera.location = position;
        Ok(())
    }

    fn move_camera_along_view(&mut self, delta: f64) -> Result<()> {
        let step = self.state.camera.forward() * delta;
        self.state.camera.location += step;
        Ok(())
    }

    fn point_camera_at(&mut self, target: Point3<f64>) -> Result<()> {
        let camera = &mut self.state.camera;
        let direction = target - camera.location;
        if direction.norm() == 0.0 {
            return Ok(());
        }
        let up = if direction.cross(&Vector3::z()).norm() > 1e-9 {
            Vector3::z()
        } else {
            Vector3::y()
        };
        let (roll, pitch, yaw) = Rotation3::face_towards(&-direction, &up).euler_angles();
        camera.rotation = Vector3::new(roll, pitch, yaw);
        Ok(())
    }

    fn frame_objects(&mut self, objects: &[ObjectHandle]) -> Result<()> {
        let mut points = Vec::new();
        for &handle in objects {
            points.extend(self.object(handle)?.world_vertices());
        }
        if points.is_empty() {
            return Ok(());
        }

        let center = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / points.len() as f64;
        let radius = points
            .iter()
            .map(|p| (p.coords - center).norm())
            .fold(1e-3, f64::max);

        let pixels = self.state.render.pixel_size();
        let camera = &mut self.state.camera;
        let corner = camera.view_frame(pixels).corners()[0];
        let half_short = corner.x.abs().min(corner.y.abs());
        let distance = match camera.projection {
            Projection::Perspective => radius / (half_short / corner.z.abs()).atan().sin(),
            Projection::Orthographic => {
                camera.ortho_scale *= radius / half_short;
                2.0 * radius + 1.0
            }
        };
        camera.location = Point3::from(center - camera.forward() * distance);
        Ok(())
    }

    fn set_background_image(&mut self, path: &Path) -> Result<()> {
        self.state.backdrop = Backdrop::Image {
            path: path.to_path_buf(),
        };
        Ok(())
    }

    fn set_background_color(&mut self, rgb: Rgb) -> Result<()> {
        self.state.backdrop = Backdrop::Color { rgb };
        Ok(())
    }

    fn set_material_color(&mut self, object: ObjectHandle, rgb: Rgb) -> Result<()> {
        self.object_mut(object)?.color = rgb;
        Ok(())
    }

    fn render_to_file(&mut self, path: &Path) -> Result<()> {
        let (width, height) = self.state.render.pixel_size();
        let mut canvas = self.draw_backdrop((width, height))?;
        let view = self.camera_view()?;
        let shade = self.shade();

        // far objects first
        let mut order: Vec<(f64, &MeshObject)> = self
            .objects
            .iter()
            .map(|o| (-view.to_camera_space(&o.location).z, o))
            .collect();
        order.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (_, obj) in order {
            let b = image_bounding_box(&obj.world_vertices(), &view);
            if b.is_degenerate() {
                debug!("{} is outside the frame", obj.name);
                continue;
            }
            let x0 = (b.x_min * width as f64).floor() as i32;
            let x1 = (b.x_max * width as f64).ceil() as i32;
            let top = ((1.0 - b.y_max) * height as f64).floor() as i32;
            let bottom = ((1.0 - b.y_min) * height as f64).ceil() as i32;
            let color = Rgb(obj.color.0.map(|c| c * shade)).to_u8();
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x0, top).of_size((x1 - x0).max(1) as u32, (bottom - top).max(1) as u32),
                Pixel(color),
            );
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        canvas
            .save(path)
            .with_context(|| format!("saving render {}", path.display()))?;
        Ok(())
    }

    fn reset_scene(&mut self) -> Result<()> {
        self.objects.clear();
        self.lights.clear();
        self.save_checkpoint()?;
        self.open_checkpoint()
    }

    fn world_vertices(&self, object: ObjectHandle) -> Result<Vec<Point3<f64>>> {
        Ok(self.object(object)?.world_vertices())
    }

    fn camera_view(&self) -> Result<CameraView> {
        let camera = &self.state.camera;
        let frame = camera.view_frame(self.state.render.pixel_size());
        Ok(CameraView::new(&camera.world_matrix(), frame, camera.projection)?)
    }
}
