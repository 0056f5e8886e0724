//! Iterative gradient-covariance sub-pixel corner refinement.
//!
//! At a true X-junction every image gradient `g` in the window is orthogonal
//! to the vector from the corner `q` to its sample point `p`, so `q` solves
//! `Σ w·g·gᵀ·(p − q) = 0`. Each iteration resamples the window around the
//! current estimate and solves that 2×2 system.

use chesscal_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;

use crate::params::SubPixParams;

/// Effective half window for a grid with the given minimum corner spacing.
pub fn effective_half_window(params: &SubPixParams, min_spacing: f32) -> usize {
    let cap = (params.max_window_spacing_ratio * min_spacing).floor() as i64;
    (params.half_window as i64).min(cap).max(2) as usize
}

fn gaussian_mask(half: usize) -> Vec<f64> {
    let size = 2 * half + 1;
    let coeff = 1.0 / (half as f64 * half as f64);
    let axis: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - half as f64;
            (-d * d * coeff).exp()
        })
        .collect();
    let mut mask = Vec::with_capacity(size * size);
    for wy in &axis {
        for wx in &axis {
            mask.push(wx * wy);
        }
    }
    mask
}

/// Refine one corner. Returns the start point if the iteration diverges
/// further than `half` pixels.
pub fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    half: usize,
    params: &SubPixParams,
) -> Point2<f32> {
    let size = 2 * half + 1;
    let padded = size + 2;
    let mask = gaussian_mask(half);
    let eps2 = params.epsilon * params.epsilon;

    let origin = Point2::new(start.x as f64, start.y as f64);
    let mut current = origin;
    let mut window = vec![0.0f64; padded * padded];

    for _ in 0..params.max_iterations.max(1) {
        // Sample a window one pixel wider than `size` on each side.
        let x0 = current.x - half as f64 - 1.0;
        let y0 = current.y - half as f64 - 1.0;
        for r in 0..padded {
            for c in 0..padded {
                window[r * padded + c] =
                    sample_bilinear(img, (x0 + c as f64) as f32, (y0 + r as f64) as f32) as f64;
            }
        }

        let (mut a, mut b, mut c, mut bb1, mut bb2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for i in 0..size {
            let py = i as f64 - half as f64;
            for j in 0..size {
                let px = j as f64 - half as f64;
                let at = |r: usize, c: usize| window[r * padded + c];
                let m = mask[i * size + j];
                let gx = at(i + 1, j + 2) - at(i + 1, j);
                let gy = at(i + 2, j + 1) - at(i, j + 1);
                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;

                a += gxx;
                b += gxy;
                c += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * c - b * b;
        if det.abs() <= f64::EPSILON * a.max(c).max(1.0) {
            break;
        }
        let scale = 1.0 / det;
        let next = Point2::new(
            current.x + scale * (c * bb1 - b * bb2),
            current.y + scale * (-b * bb1 + a * bb2),
        );
        let err = (next - current).norm_squared();
        current = next;
        if err <= eps2 {
            break;
        }
    }

    if (current.x - origin.x).abs() > half as f64 || (current.y - origin.y).abs() > half as f64 {
        return start;
    }
    Point2::new(current.x as f32, current.y as f32)
}

/// Refine every corner in place with a shared window.
pub fn refine_corners(
    img: &GrayImageView<'_>,
    corners: &mut [Point2<f32>],
    half: usize,
    params: &SubPixParams,
) {
    for p in corners.iter_mut() {
        *p = refine_corner(img, *p, half, params);
    }
}
