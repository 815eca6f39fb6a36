pub mod bbox;
pub mod camera;
pub mod project;

pub use bbox::BoundingBox;
pub use camera::{CameraView, Projection, ViewFrame};
pub use project::{image_bounding_box, to_camera_view};

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("camera world transform is not invertible")]
    SingularTransform,
}
