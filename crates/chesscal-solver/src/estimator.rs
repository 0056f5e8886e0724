use std::sync::Arc;

use chesscal_core::{estimate_homography, DistortionOrder, Homography, ObjectPointSet};
use levenberg_marquardt_sparse::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::{debug, info, warn};
use nalgebra::{DVector, Point2};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraModel, ImageSize, Intrinsics};
use crate::distortion::Distortion;
use crate::error::SolveError;
use crate::planar_pose::pose_from_homography;
use crate::pose::ViewPose;
use crate::problem::{CalibrationProblem, ParamLayout};
use crate::zhang::intrinsics_from_homographies;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One accepted image: board points and the detected pixels, index-aligned.
#[derive(Clone, Debug)]
pub struct PlanarView {
    pub object_points: Arc<ObjectPointSet>,
    pub image_points: Vec<Point2<f64>>,
}

/// Levenberg-Marquardt settings and stability limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Evaluation budget, in multiples of `(parameters + 1)`.
    pub patience: usize,
    /// Largest accepted magnitude of any distortion coefficient.
    pub max_abs_coefficient: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            patience: 100,
            max_abs_coefficient: 1e4,
        }
    }
}

/// Solved camera and per-view poses.
#[derive(Clone, Debug)]
pub struct CalibrationSolution {
    pub camera: CameraModel,
    /// One pose per input view, in input order.
    pub poses: Vec<ViewPose>,
    /// Intrinsics the refinement started from.
    pub initial_intrinsics: Intrinsics,
    /// Whether the start came from the closed-form estimate (vs. the fallback guess).
    pub closed_form_init: bool,
    /// Residual evaluations over all refinement stages.
    pub evaluations: usize,
}

/// Joint nonlinear estimator of intrinsics, distortion and poses.
#[derive(Clone, Debug, Default)]
pub struct ParameterEstimator {
    options: SolverOptions,
}

impl ParameterEstimator {
    pub const MIN_VIEWS: usize = 2;
    const MIN_POINTS_PER_VIEW: usize = 4;

    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Estimate the camera for `order` from the accepted views.
    ///
    /// Orders above five are warm-started from the five-term solution, so a
    /// richer model never ends with a larger residual than the basic one.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, views), fields(views = views.len(), order = %order))
    )]
    pub fn estimate(
        &self,
        views: &[PlanarView],
        image_size: ImageSize,
        order: DistortionOrder,
    ) -> Result<CalibrationSolution, SolveError> {
        if views.len() < Self::MIN_VIEWS {
            return Err(SolveError::TooFewViews {
                found: views.len(),
                needed: Self::MIN_VIEWS,
            });
        }
        for (idx, view) in views.iter().enumerate() {
            if view.object_points.len() != view.image_points.len() {
                return Err(SolveError::InvalidView {
                    view: idx,
                    reason: format!(
                        "{} object points vs {} image points",
                        view.object_points.len(),
                        view.image_points.len()
                    ),
                });
            }
            if view.image_points.len() < Self::MIN_POINTS_PER_VIEW {
                return Err(SolveError::InvalidView {
                    view: idx,
                    reason: format!("only {} points", view.image_points.len()),
                });
            }
        }

        let (initial, poses, closed_form_init) = initialise(views, image_size)?;

        let base = ParamLayout {
            order: DistortionOrder::Five,
            views: views.len(),
        };
        let x0 = base.pack(
            &initial,
            Distortion::zeros(DistortionOrder::Five).coefficients(),
            &poses,
        );
        let (mut x, mut evaluations) = self.refine(views, base, x0)?;
        self.check_stability(&x, base)?;

        let mut layout = base;
        if order != DistortionOrder::Five {
            let solved = unpack(&x, base);
            layout = ParamLayout {
                order,
                views: views.len(),
            };
            let warm = solved.camera.distortion.extended(order);
            let x_warm = layout.pack(&solved.camera.intrinsics, warm.coefficients(), &solved.poses);
            debug!("refining order {order} from the order 5 solution");
            let (x_hi, evals_hi) = self.refine(views, layout, x_warm)?;
            self.check_stability(&x_hi, layout)?;
            x = x_hi;
            evaluations += evals_hi;
        }

        let solved = unpack(&x, layout);
        let k = &solved.camera.intrinsics;
        info!(
            "solved order {} in {} evaluations: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
            order, evaluations, k.fx, k.fy, k.cx, k.cy
        );
        Ok(CalibrationSolution {
            camera: solved.camera,
            poses: solved.poses,
            initial_intrinsics: initial,
            closed_form_init,
            evaluations,
        })
    }

    fn refine(
        &self,
        views: &[PlanarView],
        layout: ParamLayout,
        x0: DVector<f64>,
    ) -> Result<(DVector<f64>, usize), SolveError> {
        let opts = &self.options;
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.patience.max(1));

        let problem = CalibrationProblem::new(views, layout, x0);
        let (problem, report) = lm.minimize(problem);
        debug!(
            "order {}: {:?} after {} evaluations, cost {:.6e}",
            layout.order, report.termination, report.number_of_evaluations, report.objective_function
        );

        let accepted = report.termination.was_successful()
            || matches!(report.termination, TerminationReason::NoImprovementPossible(_));
        if !accepted {
            warn!("order {} did not converge: {:?}", layout.order, report.termination);
            return Err(SolveError::NonConvergence {
                termination: format!("{:?}", report.termination),
                evaluations: report.number_of_evaluations,
            });
        }

        Ok((problem.params(), report.number_of_evaluations))
    }

    fn check_stability(&self, x: &DVector<f64>, layout: ParamLayout) -> Result<(), SolveError> {
        if let Some(idx) = x.iter().position(|v| !v.is_finite()) {
            return Err(SolveError::NumericalInstability {
                reason: format!("parameter {idx} is not finite"),
            });
        }
        if x[0] <= 0.0 || x[1] <= 0.0 {
            return Err(SolveError::NumericalInstability {
                reason: format!("non-positive focal length (fx={}, fy={})", x[0], x[1]),
            });
        }
        let names = layout.order.term_names();
        for (name, c) in names.iter().zip(&x.as_slice()[layout.distortion_range()]) {
            if c.abs() > self.options.max_abs_coefficient {
                return Err(SolveError::NumericalInstability {
                    reason: format!(
                        "{name} = {c:.3e} exceeds {:.1e}",
                        self.options.max_abs_coefficient
                    ),
                });
            }
        }
        Ok(())
    }
}

struct Unpacked {
    camera: CameraModel,
    poses: Vec<ViewPose>,
}

fn unpack(x: &DVector<f64>, layout: ParamLayout) -> Unpacked {
    let s = x.as_slice();
    let intrinsics = Intrinsics::from_slice(&s[..ParamLayout::INTRINSICS]);
    let distortion = s[layout.distortion_range()].to_vec();
    let poses = (0..layout.views)
        .map(|v| {
            let off = layout.pose_offset(v);
            ViewPose::from_slice(&s[off..off + ParamLayout::POSE])
        })
        .collect();
    Unpacked {
        camera: CameraModel {
            intrinsics,
            // The slice length always matches the layout order.
            distortion: Distortion::new(layout.order, distortion)
                .unwrap_or_else(|| Distortion::zeros(layout.order)),
        },
        poses,
    }
}

/// Homographies, initial intrinsics and initial poses.
fn initialise(
    views: &[PlanarView],
    image_size: ImageSize,
) -> Result<(Intrinsics, Vec<ViewPose>, bool), SolveError> {
    let homographies = views
        .iter()
        .enumerate()
        .map(|(idx, view)| {
            let src: Vec<Point2<f64>> = view
                .object_points
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            estimate_homography(&src, &view.image_points)
                .ok_or(SolveError::Initialisation { view: idx })
        })
        .collect::<Result<Vec<Homography>, _>>()?;

    let (intrinsics, closed_form) = match intrinsics_from_homographies(&homographies, image_size) {
        Some(k) if k.fx > 0.0 && k.fy > 0.0 => (k, true),
        _ => {
            warn!("closed-form intrinsics unavailable, starting from a centred guess");
            (Intrinsics::fallback(image_size), false)
        }
    };
    debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy
    );

    let poses = homographies
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            pose_from_homography(&intrinsics, h).ok_or(SolveError::Initialisation { view: idx })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((intrinsics, poses, closed_form))
}
