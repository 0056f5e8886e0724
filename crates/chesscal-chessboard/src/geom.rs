use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use chesscal_core::Corner;
use nalgebra::Vector2;

/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    // Normalize angle difference to [-π, π).
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis `axis_angle` (defined modulo π) and a
/// directed vector angle `vec_angle`. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(PI - diff_abs)
}

/// Check whether two undirected axes (modulo π) are orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff = axis_vec_diff(reference_angle, other_angle);
    (FRAC_PI_2 - diff).abs() <= tolerance.abs()
}

/// Convert angle (radians) to unit 2D vector.
pub fn angle_to_unit(theta: f32) -> Vector2<f32> {
    Vector2::new(theta.cos(), theta.sin())
}

/// Estimate the direction of the first grid axis from corner orientations.
///
/// Corner diagonals come in two families 90° apart, so they are averaged in
/// four-fold angle space (θ ≡ θ + π/2), weighted by strength. The grid axes sit
/// 45° from the mean diagonal. Returns `None` without a dominant orientation.
pub fn estimate_grid_axis(corners: &[Corner]) -> Option<f32> {
    let mut sum = Vector2::<f32>::zeros();
    let mut weight_sum = 0.0f32;

    for c in corners {
        let w = c.strength.max(0.0);
        if w <= 0.0 {
            continue;
        }
        let four_theta = 4.0 * c.orientation;
        sum += w * Vector2::new(four_theta.cos(), four_theta.sin());
        weight_sum += w;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let mean = sum / weight_sum;
    if mean.norm() < 0.2 {
        return None;
    }

    let diagonal = 0.25 * mean.y.atan2(mean.x);
    Some(diagonal + FRAC_PI_4)
}
