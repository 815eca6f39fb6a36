use nalgebra::{Point3, Vector3};

use crate::{
    bbox::BoundingBox,
    camera::{CameraView, Projection},
};

/// Maps a world-space point to normalized view coordinates `(x, y, depth)`.
///
/// `x` and `y` are `0..1` across the image plane for points inside the
/// frustum; `depth` is positive in front of the camera. A point on the camera
/// plane of a perspective camera maps to the image center.
pub fn to_camera_view(camera: &CameraView, point: &Point3<f64>) -> Point3<f64> {
    let local = camera.to_camera_space(point);
    let z = -local.z;

    let mut frame: [Vector3<f64>; 4] = camera.frame().corners().map(|c| -c.coords);
    if camera.projection() == Projection::Perspective {
        if z == 0.0 {
            return Point3::new(0.5, 0.5, 0.0);
        }
        for corner in frame.iter_mut() {
            *corner /= corner.z / z;
        }
    }

    let (min_x, max_x) = (frame[1].x, frame[2].x);
    let (min_y, max_y) = (frame[0].y, frame[1].y);

    Point3::new(
        (local.x - min_x) / (max_x - min_x),
        (local.y - min_y) / (max_y - min_y),
        z,
    )
}

/// Box enclosing the projection of every vertex, clamped to the frame.
/// Vertices must already be in world space. No vertices yield the zero box.
pub fn image_bounding_box<'a, I>(vertices: I, camera: &CameraView) -> BoundingBox
where
    I: IntoIterator<Item = &'a Point3<f64>>,
{
    let mut extent: Option<[f64; 4]> = None;
    for vertex in vertices {
        let p = to_camera_view(camera, vertex);
        extent = Some(match extent {
            None => [p.x, p.y, p.x, p.y],
            Some([x_min, y_min, x_max, y_max]) => [
                x_min.min(p.x),
                y_min.min(p.y),
                x_max.max(p.x),
                y_max.max(p.y),
            ],
        });
    }

    extent.map_or_else(BoundingBox::default, |e| BoundingBox::from(e).clamped())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ViewFrame;
    use nalgebra::{Matrix4, Rotation3};
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    const EPS: f64 = 1e-9;

    // Unit-depth frame, half extent 0.5: at distance d the frame spans d.
    fn unit_frame() -> ViewFrame {
        ViewFrame::from_corners([
            Point3::new(0.5, 0.5, -1.0),
            Point3::new(0.5, -0.5, -1.0),
            Point3::new(-0.5, -0.5, -1.0),
            Point3::new(-0.5, 0.5, -1.0),
        ])
    }

    fn camera_above(height: f64, projection: Projection) -> CameraView {
        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, height));
        CameraView::new(&world, unit_frame(), projection).unwrap()
    }

    fn cube(center: Point3<f64>, half: f64) -> Vec<Point3<f64>> {
        let mut v = Vec::with_capacity(8);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    v.push(center + Vector3::new(sx, sy, sz) * half);
                }
            }
        }
        v
    }

    fn assert_box(b: BoundingBox, expected: [f64; 4]) {
        for (got, want) in b.to_array().iter().zip(expected) {
            assert!((got - want).abs() < EPS, "{b:?} != {expected:?}");
        }
    }

    #[test]
    fn origin_projects_to_image_center() {
        let cam = camera_above(10.0, Projection::Perspective);
        let p = to_camera_view(&cam, &Point3::origin());
        assert!((p.x - 0.5).abs() < EPS);
        assert!((p.y - 0.5).abs() < EPS);
        assert!((p.z - 10.0).abs() < EPS);
    }

    #[test]
    fn perspective_frame_widens_with_distance() {
        let cam = camera_above(10.0, Projection::Perspective);
        // frame spans [-5, 5] at depth 10
        let p = to_camera_view(&cam, &Point3::new(2.5, -2.5, 0.0));
        assert!((p.x - 0.75).abs() < EPS);
        assert!((p.y - 0.25).abs() < EPS);

        // frame spans [-2.5, 2.5] at depth 5
        let q = to_camera_view(&cam, &Point3::new(2.5, 0.0, 5.0));
        assert!((q.x - 1.0).abs() < EPS);
    }

    #[test]
    fn orthographic_ignores_depth() {
        let cam = camera_above(10.0, Projection::Orthographic);
        let near = to_camera_view(&cam, &Point3::new(0.25, 0.0, 9.0));
        let far = to_camera_view(&cam, &Point3::new(0.25, 0.0, -40.0));
        assert!((near.x - 0.75).abs() < EPS);
        assert!((far.x - 0.75).abs() < EPS);
    }

    #[test]
    fn cube_below_camera_gives_centered_box() {
        let cam = camera_above(10.0, Projection::Perspective);
        let b = image_bounding_box(&cube(Point3::origin(), 1.0), &cam);
        // nearest face at depth 9 dominates: 1 / 9 of the frame half-width
        let half = 1.0 / 9.0;
        assert_box(b, [0.5 - half, 0.5 - half, 0.5 + half, 0.5 + half]);
    }

    #[test]
    fn vertex_on_camera_plane_falls_back_to_center() {
        let cam = camera_above(10.0, Projection::Perspective);
        let b = image_bounding_box(&[Point3::new(3.0, -1.0, 10.0)], &cam);
        assert_box(b, [0.5, 0.5, 0.5, 0.5]);

        // the fallback point takes part in the min/max like any other
        let verts = [Point3::new(3.0, -1.0, 10.0), Point3::new(2.5, 2.5, 0.0)];
        let b = image_bounding_box(&verts, &cam);
        assert_box(b, [0.5, 0.5, 0.75, 0.75]);
    }

    #[test]
    fn partially_visible_object_is_clipped_to_frame() {
        let cam = camera_above(10.0, Projection::Perspective);
        let b = image_bounding_box(&cube(Point3::new(5.0, 0.0, 0.0), 1.0), &cam);
        assert_eq!(b.x_max, 1.0);
        assert!(b.x_min > 0.5 && b.x_min < 1.0);
    }

    #[test]
    fn object_filling_view_clamps_to_full_frame() {
        let cam = camera_above(10.0, Projection::Perspective);
        let b = image_bounding_box(&cube(Point3::origin(), 50.0), &cam);
        assert_eq!(b.to_array(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn no_vertices_yield_zero_box() {
        let cam = camera_above(10.0, Projection::Perspective);
        let b = image_bounding_box(std::iter::empty(), &cam);
        assert_eq!(b, BoundingBox::default());
    }

    #[test]
    fn rotated_camera_looking_down_negative_x() {
        let rotation = Rotation3::from_euler_angles(0.0, std::f64::consts::FRAC_PI_2, 0.0);
        let world =
            Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)) * rotation.to_homogeneous();
        let cam = CameraView::new(&world, unit_frame(), Projection::Perspective).unwrap();
        let p = to_camera_view(&cam, &Point3::origin());
        assert!((p.x - 0.5).abs() < EPS);
        assert!((p.y - 0.5).abs() < EPS);
        assert!((p.z - 10.0).abs() < EPS);
    }

    #[test]
    fn projection_is_bit_identical_across_calls() {
        let cam = camera_above(7.5, Projection::Perspective);
        let verts = cube(Point3::new(0.3, -0.7, 1.1), 0.8);
        let first = image_bounding_box(&verts, &cam).to_array().map(f64::to_bits);
        for _ in 0..10 {
            let again = image_bounding_box(&verts, &cam).to_array().map(f64::to_bits);
            assert_eq!(first, again);
        }
    }

    #[test]
    fn random_meshes_always_clamp_to_unit_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        for projection in [Projection::Perspective, Projection::Orthographic] {
            let cam = camera_above(4.0, projection);
            for _ in 0..500 {
                let verts: Vec<Point3<f64>> = (0..rng.random_range(1..20))
                    .map(|_| {
                        Point3::new(
                            rng.random_range(-20.0..20.0),
                            rng.random_range(-20.0..20.0),
                            rng.random_range(-20.0..20.0),
                        )
                    })
                    .collect();
                let b = image_bounding_box(&verts, &cam);
                assert!(b.to_array().iter().all(|c| (0.0..=1.0).contains(c)), "{b:?}");
            }
        }
    }
}
