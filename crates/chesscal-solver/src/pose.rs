use nalgebra::{Isometry3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Board-to-camera pose: rotation vector (axis × angle) and translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl ViewPose {
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            rotation: iso.rotation.scaled_axis(),
            translation: iso.translation.vector,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_scaled_axis(self.rotation),
        )
    }

    #[inline]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation_matrix() * p + self.translation
    }

    pub(crate) fn from_slice(p: &[f64]) -> Self {
        Self {
            rotation: Vector3::new(p[0], p[1], p[2]),
            translation: Vector3::new(p[3], p[4], p[5]),
        }
    }

    pub(crate) fn write_to(&self, out: &mut [f64]) {
        out[..3].copy_from_slice(self.rotation.as_slice());
        out[3..6].copy_from_slice(self.translation.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn isometry_round_trip() {
        let iso = Isometry3::new(Vector3::new(10.0, -5.0, 400.0), Vector3::new(0.1, -0.2, 0.05));
        let pose = ViewPose::from_isometry(&iso);
        let p = Point3::new(25.0, 50.0, 0.0);
        assert_relative_eq!(pose.transform_point(&p), iso.transform_point(&p), epsilon = 1e-9);
        assert_relative_eq!(
            pose.to_isometry().transform_point(&p),
            iso.transform_point(&p),
            epsilon = 1e-9
        );
    }

    #[test]
    fn parameter_slice_round_trip() {
        let pose = ViewPose {
            rotation: Vector3::new(0.1, 0.2, 0.3),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let mut buf = [0.0; 6];
        pose.write_to(&mut buf);
        assert_eq!(ViewPose::from_slice(&buf), pose);
    }
}
