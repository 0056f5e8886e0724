use nalgebra::{Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::Distortion;
use crate::pose::ViewPose;

/// Pinhole intrinsics without skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Upper-triangular camera matrix `fx 0 cx / 0 fy cy / 0 0 1`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Guess used when the closed-form estimate is unavailable.
    pub fn fallback(image_size: ImageSize) -> Self {
        let (w, h) = (image_size.width as f64, image_size.height as f64);
        let f = w.max(h);
        Self {
            fx: f,
            fy: f,
            cx: 0.5 * (w - 1.0),
            cy: 0.5 * (h - 1.0),
        }
    }

    pub(crate) fn to_array(self) -> [f64; 4] {
        [self.fx, self.fy, self.cx, self.cy]
    }

    pub(crate) fn from_slice(p: &[f64]) -> Self {
        Self {
            fx: p[0],
            fy: p[1],
            cx: p[2],
            cy: p[3],
        }
    }
}

/// Decoded image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Pinhole camera composed with a distortion model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

impl CameraModel {
    /// Project a board point seen from `pose`. `None` behind the camera or
    /// where the distortion model is singular.
    pub fn project(&self, pose: &ViewPose, p: &Point3<f64>) -> Option<Point2<f64>> {
        self.project_camera_point(&pose.transform_point(p))
    }

    /// Project a point given in the camera frame.
    pub fn project_camera_point(&self, pc: &Point3<f64>) -> Option<Point2<f64>> {
        if pc.z <= 1e-12 {
            return None;
        }
        let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
        let d = self.distortion.apply(n)?;
        let k = &self.intrinsics;
        Some(Point2::new(k.fx * d.x + k.cx, k.fy * d.y + k.cy))
    }
}
