//! Closed-form intrinsics from plane homographies (Zhang), without skew.

use chesscal_core::Homography;
use nalgebra::{DMatrix, Matrix3, SVector};

use crate::camera::{ImageSize, Intrinsics};

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel-frame conditioning: centre the image and scale it to unit size.
fn normalizer(size: ImageSize) -> Matrix3<f64> {
    let (w, h) = (size.width as f64, size.height as f64);
    let s = 1.0 / w.max(h).max(1.0);
    Matrix3::new(s, 0.0, -0.5 * s * w, 0.0, s, -0.5 * s * h, 0.0, 0.0, 1.0)
}

/// Estimate `fx, fy, cx, cy` from at least two board homographies.
///
/// Solves `V b = 0` for the image of the absolute conic with an extra row
/// forcing zero skew. Returns `None` for degenerate view sets.
pub fn intrinsics_from_homographies(
    homographies: &[Homography],
    image_size: ImageSize,
) -> Option<Intrinsics> {
    if homographies.len() < 2 {
        return None;
    }
    let n = normalizer(image_size);

    let m = homographies.len();
    // Zero rows keep the thin SVD square for two views without changing the null space.
    let mut vmtx = DMatrix::<f64>::zeros((2 * m + 1).max(6), 6);
    for (k, hom) in homographies.iter().enumerate() {
        let h = n * hom.h;
        let norm = h.norm();
        if norm <= f64::EPSILON {
            return None;
        }
        let h = h / norm;
        let v11 = v_ij(&h, 0, 0);
        let v22 = v_ij(&h, 1, 1);
        let v12 = v_ij(&h, 0, 1);
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }
    // B12 = 0.
    vmtx[(2 * m, 1)] = 1.0;

    let svd = vmtx.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let mut b = v_t.row(min_idx).transpose();
    if b[0] < 0.0 {
        b = -b;
    }

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);
    let denom = b11 * b22 - b12 * b12;
    if denom <= 1e-12 * (b11 * b11 + b22 * b22) {
        return None;
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha2 = lambda / b11;
    let beta2 = lambda * b11 / denom;
    if !(alpha2 > 0.0 && beta2 > 0.0) {
        return None;
    }
    let alpha = alpha2.sqrt();
    let beta = beta2.sqrt();
    let gamma = -b12 * alpha2 * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha2 / lambda;

    // Undo the conditioning: K = N⁻¹ K_n.
    let s = n[(0, 0)];
    let k = Intrinsics {
        fx: alpha / s,
        fy: beta / s,
        cx: (u0 - n[(0, 2)]) / s,
        cy: (v0 - n[(1, 2)]) / s,
    };
    k.to_array()
        .iter()
        .all(|v| v.is_finite())
        .then_some(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Vector3};

    fn homography(k: &Intrinsics, iso: &Isometry3<f64>) -> Homography {
        let r = iso.rotation.to_rotation_matrix();
        let mut m = Matrix3::zeros();
        m.set_column(0, &r.matrix().column(0));
        m.set_column(1, &r.matrix().column(1));
        m.set_column(2, &iso.translation.vector);
        Homography::new(k.matrix() * m)
    }

    #[test]
    fn recovers_intrinsics_from_exact_homographies() {
        let truth = Intrinsics {
            fx: 900.0,
            fy: 880.0,
            cx: 650.0,
            cy: 350.0,
        };
        let poses = [
            Isometry3::new(Vector3::new(-50.0, 20.0, 600.0), Vector3::new(0.3, 0.0, 0.05)),
            Isometry3::new(Vector3::new(40.0, -10.0, 700.0), Vector3::new(-0.1, 0.35, -0.1)),
            Isometry3::new(Vector3::new(0.0, 0.0, 550.0), Vector3::new(0.2, -0.25, 0.0)),
        ];
        let hs: Vec<Homography> = poses.iter().map(|p| homography(&truth, p)).collect();
        let size = ImageSize {
            width: 1280,
            height: 720,
        };
        let k = intrinsics_from_homographies(&hs, size).expect("estimate");
        assert!((k.fx - truth.fx).abs() < 1e-3, "{k:?}");
        assert!((k.fy - truth.fy).abs() < 1e-3, "{k:?}");
        assert!((k.cx - truth.cx).abs() < 1e-3, "{k:?}");
        assert!((k.cy - truth.cy).abs() < 1e-3, "{k:?}");
    }

    #[test]
    fn single_view_is_not_enough() {
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let h = Homography::new(Matrix3::identity());
        assert!(intrinsics_from_homographies(&[h], size).is_none());
    }
}
