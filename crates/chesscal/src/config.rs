//! Run configuration: JSON-backed settings and their validated form.

use std::fs;
use std::path::Path;

use chesscal_chessboard::ChessboardParams;
use chesscal_core::{Board, BoardError, BoardSpec, DistortionOrder, UnsupportedDistortionOrder};
use chesscal_solver::{ParameterEstimator, SolverOptions};
use serde::{Deserialize, Serialize};

/// Errors from loading or validating a [`CalibrationConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    DistortionOrder(#[from] UnsupportedDistortionOrder),
    #[error("min_images must be at least {needed} (got {found})")]
    MinImages { found: usize, needed: usize },
    #[error("rms_warn_threshold must be a positive number of pixels (got {0})")]
    WarnThreshold(f64),
    #[error("max_workers must be at least 1 when set")]
    MaxWorkers,
}

/// User-facing calibration settings, as stored on disk.
///
/// Missing fields take their defaults, so a partial file is a valid override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inner corners along the board width.
    pub cols: u32,
    /// Inner corners along the board height.
    pub rows: u32,
    pub square_size_mm: f64,
    /// Lens focal length. Recorded in the report, never used by the solve.
    pub focal_length_mm: f64,
    /// One of 5, 8, 12 or 14.
    pub distortion_order: u32,
    pub min_images: usize,
    pub rms_warn_threshold: f64,
    pub save_full_matrix: bool,
    pub save_full_distortion: bool,
    pub detector: ChessboardParams,
    pub solver: SolverOptions,
    /// Detection threads; `None` uses the available parallelism.
    pub max_workers: Option<usize>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let board = BoardSpec::default();
        Self {
            cols: board.cols,
            rows: board.rows,
            square_size_mm: board.square_size_mm,
            focal_length_mm: 4.0,
            distortion_order: 5,
            min_images: 5,
            rms_warn_threshold: 1.0,
            save_full_matrix: true,
            save_full_distortion: true,
            detector: ChessboardParams::default(),
            solver: SolverOptions::default(),
            max_workers: None,
        }
    }
}

impl CalibrationConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn board_spec(&self) -> BoardSpec {
        BoardSpec {
            cols: self.cols,
            rows: self.rows,
            square_size_mm: self.square_size_mm,
        }
    }

    /// Check every field and resolve it into a [`CalibrationPlan`].
    pub fn validate(&self) -> Result<CalibrationPlan, ConfigError> {
        let board = Board::new(self.board_spec())?;
        let order = DistortionOrder::try_from(self.distortion_order)?;
        if self.min_images < ParameterEstimator::MIN_VIEWS {
            return Err(ConfigError::MinImages {
                found: self.min_images,
                needed: ParameterEstimator::MIN_VIEWS,
            });
        }
        if !(self.rms_warn_threshold.is_finite() && self.rms_warn_threshold > 0.0) {
            return Err(ConfigError::WarnThreshold(self.rms_warn_threshold));
        }
        if self.max_workers == Some(0) {
            return Err(ConfigError::MaxWorkers);
        }
        Ok(CalibrationPlan {
            board,
            order,
            focal_length_mm: self.focal_length_mm,
            min_images: self.min_images,
            rms_warn_threshold: self.rms_warn_threshold,
            save_full_matrix: self.save_full_matrix,
            save_full_distortion: self.save_full_distortion,
            detector: self.detector.clone(),
            solver: self.solver.clone(),
            max_workers: self.max_workers,
        })
    }
}

/// Validated settings for one calibration run.
#[derive(Clone, Debug)]
pub struct CalibrationPlan {
    pub board: Board,
    pub order: DistortionOrder,
    pub focal_length_mm: f64,
    pub min_images: usize,
    pub rms_warn_threshold: f64,
    pub save_full_matrix: bool,
    pub save_full_distortion: bool,
    pub detector: ChessboardParams,
    pub solver: SolverOptions,
    pub max_workers: Option<usize>,
}
