use std::path::PathBuf;

use chesscal_solver::SolveError;

use crate::accumulator::Diagnostics;
use crate::config::ConfigError;
use crate::discovery::DiscoveryError;
use crate::report::ReportIoError;

/// Fatal conditions of a calibration run.
///
/// Per-image problems never show up here; they are collected in
/// [`Diagnostics`], which is attached to the errors raised after ingestion.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no calibration images found in {0}")]
    NoImages(PathBuf),

    #[error(
        "only {accepted} of {attempted} images had a detectable board; at least {required} are required"
    )]
    InsufficientImages {
        accepted: usize,
        attempted: usize,
        required: usize,
        diagnostics: Diagnostics,
    },

    #[error("calibration failed: {source}")]
    Solve {
        #[source]
        source: SolveError,
        diagnostics: Diagnostics,
    },

    #[error("failed to build the detection thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write the report: {0}")]
    Report(#[from] ReportIoError),
}

impl CalibrationError {
    /// Per-image diagnostics, when the failure happened after ingestion.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            CalibrationError::InsufficientImages { diagnostics, .. }
            | CalibrationError::Solve { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// Whether retrying with a smaller distortion model is likely to help.
    pub fn suggests_lower_order(&self) -> bool {
        matches!(self, CalibrationError::Solve { source, .. } if source.suggests_lower_order())
    }
}
