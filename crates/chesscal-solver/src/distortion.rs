//! OpenCV-compatible lens distortion in normalised camera coordinates.

use chesscal_core::DistortionOrder;
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Distortion coefficients for one model order, in OpenCV layout
/// `k1, k2, p1, p2, k3, k4, k5, k6, s1, s2, s3, s4, tau_x, tau_y`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    order: DistortionOrder,
    coefficients: Vec<f64>,
}

impl Distortion {
    /// All-zero coefficients (identity mapping).
    pub fn zeros(order: DistortionOrder) -> Self {
        Self {
            order,
            coefficients: vec![0.0; order.coefficient_count()],
        }
    }

    /// Returns `None` if the length does not match the order.
    pub fn new(order: DistortionOrder, coefficients: Vec<f64>) -> Option<Self> {
        (coefficients.len() == order.coefficient_count()).then_some(Self {
            order,
            coefficients,
        })
    }

    #[inline]
    pub fn order(&self) -> DistortionOrder {
        self.order
    }

    #[inline]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// The same model embedded in a higher order, new terms set to zero.
    ///
    /// Lower orders are prefixes of higher ones, so the mapping is unchanged.
    pub fn extended(&self, order: DistortionOrder) -> Self {
        let mut coefficients = vec![0.0; order.coefficient_count()];
        let n = coefficients.len().min(self.coefficients.len());
        coefficients[..n].copy_from_slice(&self.coefficients[..n]);
        Self {
            order,
            coefficients,
        }
    }

    /// Distort a normalised point. `None` where the model is singular.
    pub fn apply(&self, p: Vector2<f64>) -> Option<Vector2<f64>> {
        distort(self.order, &self.coefficients, p)
    }
}

/// Distortion strategy keyed by model order.
///
/// `c` holds at least `order.coefficient_count()` values; the terms a given
/// order does not include are never read.
pub fn distort(order: DistortionOrder, c: &[f64], p: Vector2<f64>) -> Option<Vector2<f64>> {
    let (x, y) = (p.x, p.y);
    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let (k1, k2, p1, p2, k3) = (c[0], c[1], c[2], c[3], c[4]);
    let mut radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
    if order.has_rational() {
        let denom = 1.0 + c[5] * r2 + c[6] * r4 + c[7] * r6;
        if denom.abs() < 1e-12 {
            return None;
        }
        radial /= denom;
    }

    let mut xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let mut yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

    if order.has_thin_prism() {
        xd += c[8] * r2 + c[9] * r4;
        yd += c[10] * r2 + c[11] * r4;
    }

    if order.has_tilt() {
        let t = tilt_projection_matrix(c[12], c[13]) * Vector3::new(xd, yd, 1.0);
        if t.z.abs() < 1e-12 {
            return None;
        }
        xd = t.x / t.z;
        yd = t.y / t.z;
    }

    Some(Vector2::new(xd, yd))
}

/// Homography from the ideal to the tilted sensor plane.
pub fn tilt_projection_matrix(tau_x: f64, tau_y: f64) -> Matrix3<f64> {
    let (s_tx, c_tx) = tau_x.sin_cos();
    let (s_ty, c_ty) = tau_y.sin_cos();

    let rot_x = Matrix3::new(1.0, 0.0, 0.0, 0.0, c_tx, s_tx, 0.0, -s_tx, c_tx);
    let rot_y = Matrix3::new(c_ty, 0.0, -s_ty, 0.0, 1.0, 0.0, s_ty, 0.0, c_ty);
    let rot_xy = rot_y * rot_x;

    let proj_z = Matrix3::new(
        rot_xy[(2, 2)],
        0.0,
        -rot_xy[(0, 2)],
        0.0,
        rot_xy[(2, 2)],
        -rot_xy[(1, 2)],
        0.0,
        0.0,
        1.0,
    );

    proj_z * rot_xy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_coefficients_are_identity_for_every_order() {
        let p = Vector2::new(0.31, -0.22);
        for order in DistortionOrder::ALL {
            let d = Distortion::zeros(order).apply(p).expect("regular");
            assert_relative_eq!(d, p, epsilon = 1e-15);
        }
    }

    #[test]
    fn radial_and_tangential_terms() {
        let d = Distortion::new(DistortionOrder::Five, vec![0.1, 0.0, 0.01, 0.0, 0.0])
            .expect("five terms");
        let p = Vector2::new(0.5, 0.0);
        let out = d.apply(p).expect("regular");
        // r² = 0.25: radial 1.025, p1 adds 0 in x and 0.01 * 0.25 in y.
        assert_relative_eq!(out.x, 0.5 * 1.025, epsilon = 1e-12);
        assert_relative_eq!(out.y, 0.0025, epsilon = 1e-12);
    }

    #[test]
    fn rational_denominator_divides_radial_gain() {
        let mut c = vec![0.0; 8];
        c[0] = 0.2;
        c[5] = 0.2;
        let d = Distortion::new(DistortionOrder::Eight, c).expect("eight terms");
        let p = Vector2::new(0.4, 0.3);
        // Equal numerator and denominator: identity.
        assert_relative_eq!(d.apply(p).expect("regular"), p, epsilon = 1e-12);
    }

    #[test]
    fn thin_prism_shifts_by_radius() {
        let mut c = vec![0.0; 12];
        c[8] = 0.01;
        c[11] = -0.02;
        let d = Distortion::new(DistortionOrder::Twelve, c).expect("twelve terms");
        let p = Vector2::new(0.3, 0.4);
        let out = d.apply(p).expect("regular");
        let r2 = 0.25;
        assert_relative_eq!(out.x, 0.3 + 0.01 * r2, epsilon = 1e-12);
        assert_relative_eq!(out.y, 0.4 - 0.02 * r2 * r2, epsilon = 1e-12);
    }

    #[test]
    fn tilt_keeps_the_optical_axis_fixed() {
        let m = tilt_projection_matrix(0.05, -0.03);
        let o = m * Vector3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(o.x / o.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(o.y / o.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(tilt_projection_matrix(0.0, 0.0), Matrix3::identity());

        let mut c = vec![0.0; 14];
        c[12] = 0.05;
        let d = Distortion::new(DistortionOrder::Fourteen, c).expect("fourteen terms");
        let moved = d.apply(Vector2::new(0.0, 0.3)).expect("regular");
        assert!((moved.y - 0.3).abs() > 1e-4);
    }

    #[test]
    fn extension_preserves_mapping() {
        let d5 = Distortion::new(DistortionOrder::Five, vec![-0.2, 0.05, 0.001, -0.002, 0.01])
            .expect("five terms");
        let d14 = d5.extended(DistortionOrder::Fourteen);
        assert_eq!(d14.coefficients().len(), 14);
        let p = Vector2::new(-0.35, 0.27);
        assert_relative_eq!(
            d5.apply(p).expect("regular"),
            d14.apply(p).expect("regular"),
            epsilon = 1e-14
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(Distortion::new(DistortionOrder::Eight, vec![0.0; 5]).is_none());
    }
}
