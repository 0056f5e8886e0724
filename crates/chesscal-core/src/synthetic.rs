//! Synthetic planar-board helpers.
//!
//! These build simple camera poses around a chessboard and render anti-aliased
//! board images through a pinhole camera, optionally with radial lens
//! distortion. Tests across the workspace use them to get images and
//! correspondences with known ground truth.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Translation3, UnitQuaternion, Vector3};

use crate::{Board, GrayImage, Homography};

/// Gray level of the dark squares.
pub const DARK: u8 = 30;
/// Gray level of the light squares and the quiet zone around the board.
pub const LIGHT: u8 = 220;
/// Gray level outside the printed board.
pub const BACKGROUND: u8 = 128;

const UNDISTORT_ITERATIONS: usize = 50;

/// Pinhole intrinsics used to generate synthetic data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinholeIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl PinholeIntrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Project a camera-frame point (no distortion).
    pub fn project(&self, pc: &Point3<f64>) -> Point2<f64> {
        self.to_pixel(Point2::new(pc.x / pc.z, pc.y / pc.z))
    }

    pub fn to_pixel(&self, n: Point2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    pub fn normalise(&self, px: Point2<f64>) -> Point2<f64> {
        Point2::new((px.x - self.cx) / self.fx, (px.y - self.cy) / self.fy)
    }
}

/// Radial lens distortion `x_d = x (1 + k1 r² + k2 r⁴)` on normalised coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RadialDistortion {
    pub k1: f64,
    pub k2: f64,
}

impl RadialDistortion {
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let r2 = n.coords.norm_squared();
        n * (1.0 + self.k1 * r2 + self.k2 * r2 * r2)
    }

    /// Fixed-point inverse of [`Self::distort`]; converges for mild distortion.
    pub fn undistort(&self, d: Point2<f64>) -> Point2<f64> {
        let mut n = d;
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = n.coords.norm_squared();
            let next = d / (1.0 + self.k1 * r2 + self.k2 * r2 * r2);
            let step = (next - n).norm_squared();
            n = next;
            if step < 1e-24 {
                break;
            }
        }
        n
    }
}

/// Pose of the board in the camera frame that puts the board centre at
/// `(offset_x, offset_y, distance)` after rotating by `(rx, ry, rz)` radians.
pub fn board_pose(
    board: &Board,
    (rx, ry, rz): (f64, f64, f64),
    (offset_x, offset_y): (f64, f64),
    distance: f64,
) -> Isometry3<f64> {
    let rotation = UnitQuaternion::from_euler_angles(rx, ry, rz);
    let centre = Vector3::new(
        (board.cols() - 1) as f64 * board.square_size() * 0.5,
        (board.rows() - 1) as f64 * board.square_size() * 0.5,
        0.0,
    );
    let t = Vector3::new(offset_x, offset_y, distance) - rotation * centre;
    Isometry3::from_parts(Translation3::from(t), rotation)
}

/// A deterministic spread of `n` views with tilts up to ~20°.
pub fn orbit_poses(board: &Board, n: usize, distance: f64) -> Vec<Isometry3<f64>> {
    (0..n)
        .map(|k| {
            let k = k as f64;
            let rx = 0.35 * (0.9 * k + 0.3).sin();
            let ry = 0.35 * (1.3 * k).cos();
            let rz = 0.15 * (0.5 * k).sin();
            let ox = 0.08 * distance * (0.7 * k).sin();
            let oy = 0.06 * distance * (1.1 * k).cos();
            let z = distance * (1.0 + 0.12 * (0.4 * k).sin());
            board_pose(board, (rx, ry, rz), (ox, oy), z)
        })
        .collect()
}

/// Homography mapping board millimetres (z = 0) to pixels: `K [r1 r2 t]`.
pub fn board_to_image_homography(k: &PinholeIntrinsics, pose: &Isometry3<f64>) -> Homography {
    let r = pose.rotation.to_rotation_matrix();
    let r = r.matrix();
    let mut m = Matrix3::zeros();
    m.set_column(0, &r.column(0));
    m.set_column(1, &r.column(1));
    m.set_column(2, &pose.translation.vector);
    Homography::new(k.matrix() * m)
}

/// Ideal pixel positions of all inner corners, in object-point order.
pub fn project_inner_corners(
    board: &Board,
    k: &PinholeIntrinsics,
    pose: &Isometry3<f64>,
) -> Vec<Point2<f64>> {
    board
        .object_points()
        .iter()
        .map(|p| k.project(&pose.transform_point(p)))
        .collect()
}

/// Pixel positions of all inner corners seen through `distortion`.
pub fn project_distorted_corners(
    board: &Board,
    k: &PinholeIntrinsics,
    distortion: &RadialDistortion,
    pose: &Isometry3<f64>,
) -> Vec<Point2<f64>> {
    board
        .object_points()
        .iter()
        .map(|p| {
            let pc = pose.transform_point(p);
            k.to_pixel(distortion.distort(Point2::new(pc.x / pc.z, pc.y / pc.z)))
        })
        .collect()
}

fn board_value(board: &Board, u: f64, v: f64) -> u8 {
    // (u, v) in square units with inner corner (i, j) at (i, j).
    let (cols, rows) = (board.cols() as f64, board.rows() as f64);
    if u < -1.0 || v < -1.0 || u >= cols || v >= rows {
        if u < -2.0 || v < -2.0 || u >= cols + 1.0 || v >= rows + 1.0 {
            return BACKGROUND;
        }
        return LIGHT;
    }
    let parity = (u.floor() as i64 + v.floor() as i64).rem_euclid(2);
    if parity == 0 {
        DARK
    } else {
        LIGHT
    }
}

/// Render the board seen through `img_from_board` (millimetres to pixels).
///
/// Pixel `(x, y)` covers `[x - 0.5, x + 0.5)`; pixels that straddle an edge are
/// box-filtered with `supersample²` samples.
pub fn render_chessboard(
    board: &Board,
    img_from_board: &Homography,
    width: usize,
    height: usize,
    supersample: usize,
) -> Option<GrayImage> {
    let board_from_img = img_from_board.inverse()?;
    Some(render_with(board, width, height, supersample, |px| {
        board_from_img.apply(px)
    }))
}

/// Render the board at `pose` through `k` and radial `distortion`.
///
/// Every sample is undistorted to its ideal pinhole pixel before being mapped
/// back onto the board plane.
pub fn render_distorted_chessboard(
    board: &Board,
    k: &PinholeIntrinsics,
    distortion: &RadialDistortion,
    pose: &Isometry3<f64>,
    width: usize,
    height: usize,
    supersample: usize,
) -> Option<GrayImage> {
    let board_from_img = board_to_image_homography(k, pose).inverse()?;
    Some(render_with(board, width, height, supersample, |px| {
        board_from_img.apply(k.to_pixel(distortion.undistort(k.normalise(px))))
    }))
}

fn render_with(
    board: &Board,
    width: usize,
    height: usize,
    supersample: usize,
    board_from_pixel: impl Fn(Point2<f64>) -> Point2<f64>,
) -> GrayImage {
    let s = board.square_size();
    let ss = supersample.max(1);
    let sample = |x: f64, y: f64| {
        let p = board_from_pixel(Point2::new(x, y));
        board_value(board, p.x / s, p.y / s)
    };

    let mut img = GrayImage::filled(width, height, BACKGROUND);
    for y in 0..height {
        for x in 0..width {
            let (xf, yf) = (x as f64, y as f64);
            let corner_samples = [
                sample(xf - 0.5, yf - 0.5),
                sample(xf + 0.5, yf - 0.5),
                sample(xf - 0.5, yf + 0.5),
                sample(xf + 0.5, yf + 0.5),
            ];
            let value = if corner_samples.iter().all(|&p| p == corner_samples[0]) {
                corner_samples[0]
            } else {
                let mut acc = 0u32;
                for a in 0..ss {
                    for b in 0..ss {
                        let sx = xf - 0.5 + (a as f64 + 0.5) / ss as f64;
                        let sy = yf - 0.5 + (b as f64 + 0.5) / ss as f64;
                        acc += sample(sx, sy) as u32;
                    }
                }
                ((acc as f64 / (ss * ss) as f64).round()) as u8
            };
            img.data[y * width + x] = value;
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoardSpec;

    fn board() -> Board {
        Board::new(BoardSpec {
            cols: 6,
            rows: 4,
            square_size_mm: 20.0,
        })
        .expect("valid board")
    }

    #[test]
    fn homography_matches_point_projection() {
        let board = board();
        let k = PinholeIntrinsics {
            fx: 600.0,
            fy: 610.0,
            cx: 320.0,
            cy: 240.0,
        };
        for pose in orbit_poses(&board, 5, 400.0) {
            let h = board_to_image_homography(&k, &pose);
            let projected = project_inner_corners(&board, &k, &pose);
            for (obj, px) in board.object_points().iter().zip(&projected) {
                let via_h = h.apply(Point2::new(obj.x, obj.y));
                approx::assert_relative_eq!(via_h.x, px.x, epsilon = 1e-9);
                approx::assert_relative_eq!(via_h.y, px.y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fronto_parallel_render_has_expected_squares() {
        let board = board();
        // 2 px per mm, first inner corner at pixel (100, 80).
        let h = Homography::new(Matrix3::new(2.0, 0.0, 100.0, 0.0, 2.0, 80.0, 0.0, 0.0, 1.0));
        let img = render_chessboard(&board, &h, 400, 300, 4).expect("invertible");
        let view = img.view();
        // Square (-1, -1) is dark, square (0, -1) is light.
        assert_eq!(view.get(80, 60), DARK);
        assert_eq!(view.get(120, 60), LIGHT);
        assert_eq!(view.get(120, 100), DARK);
        // Quiet zone and background.
        assert_eq!(view.get(45, 60), LIGHT);
        assert_eq!(view.get(5, 5), BACKGROUND);
    }

    #[test]
    fn undistort_inverts_radial_distortion() {
        let d = RadialDistortion { k1: -0.2, k2: 0.07 };
        for &(x, y) in &[(0.0, 0.0), (0.3, -0.2), (-0.45, 0.35), (0.1, 0.5)] {
            let n = Point2::new(x, y);
            let back = d.undistort(d.distort(n));
            approx::assert_relative_eq!(back.x, n.x, epsilon = 1e-10);
            approx::assert_relative_eq!(back.y, n.y, epsilon = 1e-10);
        }
    }

    #[test]
    fn zero_distortion_render_matches_pinhole_render() {
        let board = board();
        let k = PinholeIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 160.0,
            cy: 120.0,
        };
        let pose = orbit_poses(&board, 3, 350.0)[2];
        let h = board_to_image_homography(&k, &pose);
        let plain = render_chessboard(&board, &h, 320, 240, 4).expect("invertible");
        let warped = render_distorted_chessboard(
            &board,
            &k,
            &RadialDistortion::default(),
            &pose,
            320,
            240,
            4,
        )
        .expect("invertible");
        let differing = plain
            .data
            .iter()
            .zip(&warped.data)
            .filter(|(a, b)| a.abs_diff(**b) > 1)
            .count();
        assert!(differing < 10, "{differing} pixels differ");
        assert_eq!(
            project_distorted_corners(&board, &k, &RadialDistortion::default(), &pose),
            project_inner_corners(&board, &k, &pose)
        );
    }
}
