//! End-to-end calibration: discover, detect in parallel, estimate, evaluate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chesscal_chessboard::ChessboardDetector;
use chesscal_solver::{evaluate, CalibrationSolution, ParameterEstimator, ReprojectionReport};
use chrono::Local;
use log::{info, warn};
use rayon::prelude::*;

use crate::accumulator::{CorrespondenceAccumulator, Correspondences};
use crate::config::{CalibrationConfig, CalibrationPlan};
use crate::detect::observe_image;
use crate::discovery::discover_images;
use crate::error::CalibrationError;
use crate::report::{CalibrationReport, CalibrationResult};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Everything a successful run produces.
#[derive(Clone, Debug)]
pub struct CalibrationOutcome {
    pub result: CalibrationResult,
    pub report: CalibrationReport,
    pub reprojection: ReprojectionReport,
    pub solution: CalibrationSolution,
}

impl CalibrationOutcome {
    /// Persist the report as `camera_calibration_<timestamp>.json` in `dir`.
    pub fn save_report(&self, dir: impl AsRef<Path>) -> Result<PathBuf, CalibrationError> {
        Ok(self.report.save_in(dir, &self.result.report_file_name())?)
    }
}

/// Runs calibrations for one validated configuration.
pub struct Calibrator {
    plan: CalibrationPlan,
}

impl Calibrator {
    pub fn new(plan: CalibrationPlan) -> Self {
        Self { plan }
    }

    pub fn from_config(config: &CalibrationConfig) -> Result<Self, CalibrationError> {
        Ok(Self::new(config.validate()?))
    }

    #[inline]
    pub fn plan(&self) -> &CalibrationPlan {
        &self.plan
    }

    /// Calibrate from every image found in `dir`.
    pub fn run_directory(&self, dir: impl AsRef<Path>) -> Result<CalibrationOutcome, CalibrationError> {
        let dir = dir.as_ref();
        let paths = discover_images(dir)?;
        if paths.is_empty() {
            return Err(CalibrationError::NoImages(dir.to_path_buf()));
        }
        info!("found {} images in {}", paths.len(), dir.display());
        let correspondences = self.detect_all(&paths)?;
        self.calibrate(&correspondences)
    }

    /// Detect the board in every image on a pool of `max_workers` threads.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, paths), fields(images = paths.len()))
    )]
    pub fn detect_all(&self, paths: &[PathBuf]) -> Result<Correspondences, CalibrationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.plan.max_workers.unwrap_or(0))
            .build()?;
        let detector = ChessboardDetector::new(self.plan.board, self.plan.detector.clone());
        let accumulator = CorrespondenceAccumulator::new(Arc::new(self.plan.board.object_points()));

        pool.install(|| {
            paths.par_iter().enumerate().for_each(|(index, path)| {
                accumulator.ingest(observe_image(&detector, index, path));
            });
        });

        let correspondences = accumulator.finish();
        info!(
            "board found in {}/{} images",
            correspondences.diagnostics.accepted, correspondences.diagnostics.attempted
        );
        Ok(correspondences)
    }

    /// Solve, evaluate and assemble the result from accepted observations.
    ///
    /// Fails before any solving when fewer than `min_images` were accepted, or
    /// fewer than the estimator's own minimum for a hand-built plan.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, correspondences), fields(accepted = correspondences.accepted_count()))
    )]
    pub fn calibrate(
        &self,
        correspondences: &Correspondences,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        let diagnostics = &correspondences.diagnostics;
        let accepted = correspondences.accepted_count();
        let required = self.plan.min_images.max(ParameterEstimator::MIN_VIEWS);
        let image_size = match correspondences.image_size() {
            Some(size) if accepted >= required => size,
            _ => {
                return Err(CalibrationError::InsufficientImages {
                    accepted,
                    attempted: diagnostics.attempted,
                    required,
                    diagnostics: diagnostics.clone(),
                })
            }
        };
        if let Some(other) = correspondences
            .accepted
            .iter()
            .find(|a| a.size != image_size)
        {
            warn!(
                "{} is {}x{}, calibrating for {}x{}",
                other.path.display(),
                other.size.width,
                other.size.height,
                image_size.width,
                image_size.height
            );
        }

        let views = correspondences.views();
        let estimator = ParameterEstimator::new(self.plan.solver.clone());
        let solution = estimator
            .estimate(&views, image_size, self.plan.order)
            .map_err(|source| CalibrationError::Solve {
                source,
                diagnostics: diagnostics.clone(),
            })?;

        let reprojection = evaluate(&solution.camera, &solution.poses, &views);
        let result = CalibrationResult::assemble(&solution, &reprojection, Local::now());
        let report = CalibrationReport::new(&self.plan, &result, &reprojection, correspondences);
        info!(
            "calibrated from {} images: rms {:.4} px ({})",
            result.images_used,
            result.rms,
            result.quality()
        );

        Ok(CalibrationOutcome {
            result,
            report,
            reprojection,
            solution,
        })
    }
}
