//! Recording host for tests: every call is logged, meshes are unit cubes and
//! the camera hangs above the origin looking straight down.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use projector::{CameraView, Projection, ViewFrame};

use crate::host::{LightHandle, ObjectHandle, RenderSettings, Rgb, SceneHost};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ConfigureRender(RenderSettings),
    Import(PathBuf, String),
    Transform {
        object: ObjectHandle,
        delta_rotation: Option<Vector3<f64>>,
        location: Option<Point3<f64>>,
    },
    AddLight(Point3<f64>, f64),
    CameraPosition(Point3<f64>),
    MoveCamera(f64),
    PointCamera(Point3<f64>),
    Frame(Vec<ObjectHandle>),
    BackgroundImage(PathBuf),
    BackgroundColor(Rgb),
    MaterialColor(ObjectHandle, Rgb),
    Render(PathBuf),
    Reset,
}

struct FakeObject {
    location: Point3<f64>,
    delta_rotation: Vector3<f64>,
}

pub struct FakeHost {
    pub calls: Vec<Call>,
    objects: Vec<FakeObject>,
    lights: usize,
    camera_height: f64,
    fail_imports: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            objects: Vec::new(),
            lights: 0,
            camera_height: 10.0,
            fail_imports: false,
        }
    }

    pub fn failing_imports() -> Self {
        Self {
            fail_imports: true,
            ..Self::new()
        }
    }

    /// Calls grouped per image, each group ending with its `Reset`.
    pub fn images(&self) -> Vec<&[Call]> {
        self.calls
            .split_inclusive(|c| *c == Call::Reset)
            .filter(|g| g.last() == Some(&Call::Reset))
            .collect()
    }

    fn object(&self, handle: ObjectHandle) -> Result<&FakeObject> {
        self.objects
            .get(handle.0)
            .ok_or_else(|| anyhow!("unknown object {handle:?}"))
    }
}

fn cube() -> Vec<Point3<f64>> {
    let mut v = Vec::new();
    for x in [-0.5, 0.5] {
        for y in [-0.5, 0.5] {
            for z in [0.0, 1.0] {
                v.push(Point3::new(x, y, z));
            }
        }
    }
    v
}

impl SceneHost for FakeHost {
    fn configure_render(&mut self, settings: RenderSettings) -> Result<()> {
        self.calls.push(Call::ConfigureRender(settings));
        Ok(())
    }

    fn import_mesh(&mut self, path: &Path, name: &str) -> Result<ObjectHandle> {
        if self.fail_imports {
            return Err(anyhow!("import failed for {}", path.display()));
        }
        self.calls.push(Call::Import(path.to_path_buf(), name.to_string()));
        self.objects.push(FakeObject {
            location: Point3::origin(),
            delta_rotation: Vector3::zeros(),
        });
        Ok(ObjectHandle(self.objects.len() - 1))
    }

    fn set_object_transform(
        &mut self,
        object: ObjectHandle,
        delta_rotation: Option<Vector3<f64>>,
        location: Option<Point3<f64>>,
    ) -> Result<()> {
        self.object(object)?;
        self.calls.push(Call::Transform {
            object,
            delta_rotation,
            location,
        });
        let obj = &mut self.objects[object.0];
        if let Some(r) = delta_rotation {
            obj.delta_rotation = r;
        }
        if let Some(l) = location {
            obj.location = l;
        }
        Ok(())
    }

    fn add_point_light(&mut self, position: Point3<f64>, energy: f64) -> Result<LightHandle> {
        self.calls.push(Call::AddLight(position, energy));
        self.lights += 1;
        Ok(LightHandle(self.lights - 1))
    }

    fn set_camera_position(&mut self, position: Point3<f64>) -> Result<()> {
        self.calls.push(Call::CameraPosition(position));
        Ok(())
    }

    fn move_camera_along_view(&mut self, delta: f64) -> Result<()> {
        self.calls.push(Call::MoveCamera(delta));
        self.camera_height -= delta;
        Ok(())
    }

    fn point_camera_at(&mut self, target: Point3<f64>) -> Result<()> {
        self.calls.push(Call::PointCamera(target));
        Ok(())
    }

    fn frame_objects(&mut self, objects: &[ObjectHandle]) -> Result<()> {
        self.calls.push(Call::Frame(objects.to_vec()));
        Ok(())
    }

    fn set_background_image(&mut self, path: &Path) -> Result<()> {
        self.calls.push(Call::BackgroundImage(path.to_path_buf()));
        Ok(())
    }

    fn set_background_color(&mut self, rgb: Rgb) -> Result<()> {
        self.calls.push(Call::BackgroundColor(rgb));
        Ok(())
    }

    fn set_material_color(&mut self, object: ObjectHandle, rgb: Rgb) -> Result<()> {
        self.object(object)?;
        self.calls.push(Call::MaterialColor(object, rgb));
        Ok(())
    }

    fn render_to_file(&mut self, path: &Path) -> Result<()> {
        self.calls.push(Call::Render(path.to_path_buf()));
        Ok(())
    }

    fn reset_scene(&mut self) -> Result<()> {
        self.calls.push(Call::Reset);
        self.objects.clear();
        self.lights = 0;
        Ok(())
    }

    fn world_vertices(&self, object: ObjectHandle) -> Result<Vec<Point3<f64>>> {
        let obj = self.object(object)?;
        let r = obj.delta_rotation;
        let rotation = Rotation3::from_euler_angles(r.x, r.y, r.z);
        Ok(cube()
            .iter()
            .map(|v| obj.location + rotation * v.coords)
            .collect())
    }

    fn camera_view(&self) -> Result<CameraView> {
        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, self.camera_height));
        Ok(CameraView::new(
            &world,
            ViewFrame::perspective(36.0, 36.0, 1, 1),
            Projection::Perspective,
        )?)
    }
}
