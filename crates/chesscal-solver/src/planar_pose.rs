use chesscal_core::Homography;
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::camera::Intrinsics;
use crate::pose::ViewPose;

/// Decompose a board homography `H = K [r1 r2 t]` into a pose.
///
/// The rotation is projected onto SO(3) and the sign is chosen so that the
/// board lies in front of the camera.
pub fn pose_from_homography(k: &Intrinsics, hom: &Homography) -> Option<ViewPose> {
    let k_inv = k.matrix().try_inverse()?;
    let m = k_inv * hom.h;
    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let scale = 0.5 * (h1.norm() + h2.norm());
    if scale <= f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / scale;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    let iso = Isometry3::from_parts(Translation3::from(h3 * lambda), rot);
    Some(ViewPose::from_isometry(&iso))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn recovers_pose_and_puts_board_in_front() {
        let k = Intrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
        };
        let iso = Isometry3::new(Vector3::new(30.0, -15.0, 500.0), Vector3::new(0.1, -0.05, 0.2));
        let r = iso.rotation.to_rotation_matrix();
        let mut m = Matrix3::zeros();
        m.set_column(0, &r.matrix().column(0));
        m.set_column(1, &r.matrix().column(1));
        m.set_column(2, &iso.translation.vector);

        // Homographies are defined up to scale, including a negative one.
        for scale in [1.0, -0.01] {
            let h = Homography::new(k.matrix() * m * scale);
            let pose = pose_from_homography(&k, &h).expect("pose");
            assert!(pose.translation.z > 0.0);
            let p = Point3::new(100.0, 50.0, 0.0);
            assert_relative_eq!(pose.transform_point(&p), iso.transform_point(&p), epsilon = 1e-6);
        }
    }
}
