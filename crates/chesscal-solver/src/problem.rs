//! Joint least-squares problem over intrinsics, distortion and view poses.

use chesscal_core::DistortionOrder;
use levenberg_marquardt_sparse::{LeastSquaresProblem, SparseJacobian};
use nalgebra::{storage::Owned, DVector, Dyn, Point3, Vector2};

use crate::camera::Intrinsics;
use crate::distortion::distort;
use crate::pose::ViewPose;
use crate::PlanarView;

/// Residual assigned to a point that cannot be projected.
const INVALID_RESIDUAL: f64 = 1e6;

/// Parameter vector layout: `[fx, fy, cx, cy, d_1..d_k, (ω, t)_1..N]`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamLayout {
    pub order: DistortionOrder,
    pub views: usize,
}

impl ParamLayout {
    pub const INTRINSICS: usize = 4;
    pub const POSE: usize = 6;

    #[inline]
    pub fn distortion_range(&self) -> std::ops::Range<usize> {
        Self::INTRINSICS..self.global_len()
    }

    /// Intrinsics plus distortion: the parameters shared by every view.
    #[inline]
    pub fn global_len(&self) -> usize {
        Self::INTRINSICS + self.order.coefficient_count()
    }

    #[inline]
    pub fn pose_offset(&self, view: usize) -> usize {
        self.global_len() + Self::POSE * view
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pose_offset(self.views)
    }

    pub fn pack(
        &self,
        intrinsics: &Intrinsics,
        distortion: &[f64],
        poses: &[ViewPose],
    ) -> DVector<f64> {
        let mut x = DVector::zeros(self.len());
        x.as_mut_slice()[..Self::INTRINSICS].copy_from_slice(&intrinsics.to_array());
        x.as_mut_slice()[self.distortion_range()].copy_from_slice(distortion);
        for (v, pose) in poses.iter().enumerate() {
            let off = self.pose_offset(v);
            pose.write_to(&mut x.as_mut_slice()[off..off + Self::POSE]);
        }
        x
    }
}

pub(crate) struct CalibrationProblem<'a> {
    views: &'a [PlanarView],
    layout: ParamLayout,
    /// First residual row of each view.
    row_offsets: Vec<usize>,
    residual_count: usize,
    params: DVector<f64>,
}

impl<'a> CalibrationProblem<'a> {
    pub fn new(views: &'a [PlanarView], layout: ParamLayout, initial: DVector<f64>) -> Self {
        let mut row_offsets = Vec::with_capacity(views.len());
        let mut rows = 0;
        for view in views {
            row_offsets.push(rows);
            rows += 2 * view.image_points.len();
        }
        Self {
            views,
            layout,
            row_offsets,
            residual_count: rows,
            params: initial,
        }
    }

    /// Residuals `projected - observed` of one view, interleaved x/y.
    fn view_residuals(&self, x: &[f64], view_idx: usize, out: &mut [f64]) {
        let layout = self.layout;
        let k = Intrinsics::from_slice(&x[..ParamLayout::INTRINSICS]);
        let dist = &x[layout.distortion_range()];
        let off = layout.pose_offset(view_idx);
        let pose = ViewPose::from_slice(&x[off..off + ParamLayout::POSE]);
        let rot = pose.rotation_matrix();

        let view = &self.views[view_idx];
        for (n, (obj, obs)) in view
            .object_points
            .iter()
            .zip(&view.image_points)
            .enumerate()
        {
            let pc: Point3<f64> = rot * obj + pose.translation;
            let projected = if pc.z > 1e-12 {
                distort(layout.order, dist, Vector2::new(pc.x / pc.z, pc.y / pc.z))
                    .map(|d| (k.fx * d.x + k.cx, k.fy * d.y + k.cy))
            } else {
                None
            };
            let (rx, ry) = match projected {
                Some((u, v)) if u.is_finite() && v.is_finite() => (u - obs.x, v - obs.y),
                _ => (INVALID_RESIDUAL, INVALID_RESIDUAL),
            };
            out[2 * n] = rx;
            out[2 * n + 1] = ry;
        }
    }

    fn all_residuals(&self, x: &[f64]) -> DVector<f64> {
        let mut r = DVector::zeros(self.residual_count);
        for v in 0..self.views.len() {
            let start = self.row_offsets[v];
            let len = 2 * self.views[v].image_points.len();
            self.view_residuals(x, v, &mut r.as_mut_slice()[start..start + len]);
        }
        r
    }

    /// Central-difference Jacobian in triplet form. Pose columns only touch
    /// their own view's rows, so only that view is re-evaluated for them and
    /// only those rows are stored.
    fn numeric_jacobian(&self) -> SparseJacobian<f64> {
        let n_params = self.layout.len();
        let global = self.layout.global_len();
        let mut entries = Vec::with_capacity(self.residual_count * (global + ParamLayout::POSE));
        let mut x = self.params.as_slice().to_vec();

        for col in 0..global {
            let orig = x[col];
            let h = step(orig);
            x[col] = orig + h;
            let plus = self.all_residuals(&x);
            x[col] = orig - h;
            let minus = self.all_residuals(&x);
            x[col] = orig;
            entries.extend(
                plus.iter()
                    .zip(minus.iter())
                    .enumerate()
                    .map(|(row, (p, m))| (row, col, (p - m) / (2.0 * h))),
            );
        }

        let mut plus = Vec::new();
        let mut minus = Vec::new();
        for v in 0..self.views.len() {
            let start = self.row_offsets[v];
            let len = 2 * self.views[v].image_points.len();
            plus.resize(len, 0.0);
            minus.resize(len, 0.0);
            let off = self.layout.pose_offset(v);
            for col in off..off + ParamLayout::POSE {
                let orig = x[col];
                let h = step(orig);
                x[col] = orig + h;
                self.view_residuals(&x, v, &mut plus);
                x[col] = orig - h;
                self.view_residuals(&x, v, &mut minus);
                x[col] = orig;
                entries.extend(
                    (0..len).map(|r| (start + r, col, (plus[r] - minus[r]) / (2.0 * h))),
                );
            }
        }
        SparseJacobian::from_triplets(self.residual_count, n_params, entries)
    }
}

#[inline]
fn step(value: f64) -> f64 {
    1e-6 * value.abs().max(1.0)
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CalibrationProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.all_residuals(self.params.as_slice()))
    }

    fn jacobian(&self) -> Option<SparseJacobian<f64>> {
        Some(self.numeric_jacobian())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chesscal_core::{Board, BoardSpec};
    use nalgebra::{DMatrix, Isometry3, Point2, Vector3};
    use std::sync::Arc;

    fn setup(order: DistortionOrder) -> (Vec<PlanarView>, ParamLayout, DVector<f64>) {
        let board = Board::new(BoardSpec {
            cols: 5,
            rows: 4,
            square_size_mm: 20.0,
        })
        .expect("board");
        let object = Arc::new(board.object_points());
        let k = Intrinsics {
            fx: 700.0,
            fy: 710.0,
            cx: 320.0,
            cy: 240.0,
        };
        let poses = [
            ViewPose::from_isometry(&Isometry3::new(
                Vector3::new(-40.0, -30.0, 400.0),
                Vector3::new(0.2, -0.1, 0.05),
            )),
            ViewPose::from_isometry(&Isometry3::new(
                Vector3::new(-30.0, -20.0, 450.0),
                Vector3::new(-0.15, 0.25, 0.0),
            )),
        ];
        let mut dist = vec![0.0; order.coefficient_count()];
        dist[0] = -0.1;
        dist[2] = 0.001;

        let layout = ParamLayout { order, views: 2 };
        let x = layout.pack(&k, &dist, &poses);
        let views = poses
            .iter()
            .map(|pose| PlanarView {
                object_points: Arc::clone(&object),
                image_points: object
                    .iter()
                    .map(|p| {
                        let pc = pose.transform_point(p);
                        let d = distort(order, &dist, Vector2::new(pc.x / pc.z, pc.y / pc.z))
                            .expect("regular");
                        Point2::new(k.fx * d.x + k.cx, k.fy * d.y + k.cy)
                    })
                    .collect(),
            })
            .collect();
        (views, layout, x)
    }

    #[test]
    fn exact_parameters_give_zero_residuals() {
        let (views, layout, x) = setup(DistortionOrder::Eight);
        let problem = CalibrationProblem::new(&views, layout, x);
        let r = problem.residuals().expect("residuals");
        assert_eq!(r.len(), 2 * 2 * 20);
        assert!(r.amax() < 1e-9);
    }

    #[test]
    fn layout_offsets() {
        let layout = ParamLayout {
            order: DistortionOrder::Twelve,
            views: 3,
        };
        assert_eq!(layout.global_len(), 16);
        assert_eq!(layout.pose_offset(1), 22);
        assert_eq!(layout.len(), 34);
    }

    #[test]
    fn block_jacobian_matches_full_differences() {
        let (views, layout, x) = setup(DistortionOrder::Five);
        let problem = CalibrationProblem::new(&views, layout, x.clone());
        let sparse = problem.jacobian().expect("jacobian");
        assert_eq!((sparse.rows, sparse.cols), (2 * 2 * 20, layout.len()));

        // Pose columns of view 0 have no entries in view 1 rows.
        let rows_view0 = 2 * views[0].image_points.len();
        let off0 = layout.pose_offset(0);
        assert!(sparse
            .entries
            .iter()
            .filter(|(_, col, _)| (off0..off0 + ParamLayout::POSE).contains(col))
            .all(|(row, _, _)| *row < rows_view0));

        let jac: DMatrix<f64> = sparse.to_dense::<Dyn, Dyn>();

        // Compare one pose column against full re-evaluation.
        let col = layout.pose_offset(1) + 4;
        let h = step(x[col]);
        let mut xp = x.as_slice().to_vec();
        xp[col] += h;
        let mut xm = x.as_slice().to_vec();
        xm[col] -= h;
        let full = (problem.all_residuals(&xp) - problem.all_residuals(&xm)) / (2.0 * h);
        for row in 0..jac.nrows() {
            assert!((jac[(row, col)] - full[row]).abs() < 1e-9);
        }
    }

    #[test]
    fn sparse_jacobian_agrees_with_solver_differentiation() {
        let (views, layout, x) = setup(DistortionOrder::Eight);
        let mut problem = CalibrationProblem::new(&views, layout, x);
        let ours = problem
            .jacobian()
            .expect("jacobian")
            .to_dense::<Dyn, Dyn>();
        let reference: DMatrix<f64> =
            levenberg_marquardt_sparse::differentiate_numerically(&mut problem)
                .expect("numeric jacobian");

        assert_eq!(ours.shape(), reference.shape());
        for (a, b) in ours.iter().zip(reference.iter()) {
            assert!((a - b).abs() <= 1e-4 * b.abs().max(1.0), "{a} vs {b}");
        }
    }
}
