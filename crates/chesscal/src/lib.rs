//! Chessboard camera intrinsic calibration.
//!
//! This crate ties the workspace together:
//! - image discovery in a directory ([`discover_images`])
//! - parallel chessboard detection on a bounded `rayon` pool
//! - joint estimation of intrinsics, distortion and poses
//! - reprojection statistics and a persisted JSON report
//!
//! ## Quickstart
//!
//! ```no_run
//! use chesscal::{CalibrationConfig, Calibrator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig {
//!     cols: 9,
//!     rows: 6,
//!     square_size_mm: 25.0,
//!     distortion_order: 8,
//!     ..Default::default()
//! };
//! let calibrator = Calibrator::from_config(&config)?;
//! let outcome = calibrator.run_directory("image")?;
//! println!("rms = {:.4} px", outcome.result.rms);
//! outcome.save_report("result")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `chesscal::core`: boards, object points, homographies, images, logging.
//! - `chesscal::chessboard`: ChESS corners, grid recovery, sub-pixel refinement.
//! - `chesscal::solver`: closed-form initialisation, Levenberg-Marquardt refinement,
//!   reprojection statistics.

pub use chesscal_chessboard as chessboard;
pub use chesscal_core as core;
pub use chesscal_solver as solver;

mod accumulator;
mod config;
mod detect;
mod discovery;
mod error;
mod pipeline;
mod report;

pub use accumulator::{
    AcceptedImage, CorrespondenceAccumulator, Correspondences, Diagnostics, ImageFailure,
};
pub use config::{CalibrationConfig, CalibrationPlan, ConfigError};
pub use detect::{detect_corners, gray_view, observe_image, ImageError, ImageObservation};
pub use discovery::{discover_images, DiscoveryError, IMAGE_EXTENSIONS};
pub use error::CalibrationError;
pub use pipeline::{CalibrationOutcome, Calibrator};
pub use report::{
    CalibrationReport, CalibrationResult, DistortionTerms, ReportIoError, REPORT_FILE_FORMAT,
    TIMESTAMP_FORMAT,
};

pub use chesscal_core::{Board, BoardSpec, DistortionOrder};
pub use chesscal_solver::{QualityBand, SolveError};
