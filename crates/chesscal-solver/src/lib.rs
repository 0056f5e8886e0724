//! Planar intrinsic calibration.
//!
//! Given several views of a planar board with known point correspondences,
//! [`ParameterEstimator`] recovers `fx, fy, cx, cy`, an OpenCV-compatible
//! distortion vector of order 5, 8, 12 or 14, and one pose per view:
//!
//! 1. a homography per view (normalised DLT);
//! 2. closed-form zero-skew intrinsics (Zhang), or a centred fallback guess;
//! 3. poses decomposed from `K⁻¹ H`;
//! 4. joint Levenberg-Marquardt refinement of all parameters, first with the
//!    five-term model and then, warm-started, with the requested order.
//!
//! [`evaluate`] reports per-view and pooled reprojection RMS, and
//! [`QualityBand`] / [`Advice`] turn the pooled RMS into a verdict.

mod camera;
mod distortion;
mod error;
mod estimator;
mod planar_pose;
mod pose;
mod problem;
mod reprojection;
mod zhang;

pub use camera::{CameraModel, ImageSize, Intrinsics};
pub use distortion::{distort, tilt_projection_matrix, Distortion};
pub use error::SolveError;
pub use estimator::{CalibrationSolution, ParameterEstimator, PlanarView, SolverOptions};
pub use planar_pose::pose_from_homography;
pub use pose::ViewPose;
pub use reprojection::{evaluate, Advice, QualityBand, ReprojectionReport, ViewError};
pub use zhang::intrinsics_from_homographies;
