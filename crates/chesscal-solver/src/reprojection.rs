//! Reprojection error statistics and quality classification.

use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::pose::ViewPose;
use crate::PlanarView;

/// Error statistics of one view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewError {
    pub rms: f64,
    pub max: f64,
    pub points: usize,
}

/// Per-view and pooled reprojection errors, in pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionReport {
    pub per_view: Vec<ViewError>,
    /// `sqrt(Σ d² / N)` over every point of every view.
    pub rms: f64,
    pub max: f64,
    pub points: usize,
}

impl ReprojectionReport {
    pub fn per_view_rms(&self) -> Vec<f64> {
        self.per_view.iter().map(|v| v.rms).collect()
    }
}

/// Reproject every view under `camera` and its pose.
///
/// Points that cannot be projected count as infinitely wrong.
pub fn evaluate(camera: &CameraModel, poses: &[ViewPose], views: &[PlanarView]) -> ReprojectionReport {
    let mut per_view = Vec::with_capacity(views.len());
    let mut total_sq = 0.0;
    let mut total_points = 0usize;
    let mut total_max = 0.0f64;

    for (view, pose) in views.iter().zip(poses) {
        let mut sum_sq = 0.0;
        let mut max = 0.0f64;
        for (obj, obs) in view.object_points.iter().zip(&view.image_points) {
            let d2 = match camera.project(pose, obj) {
                Some(p) => (p - obs).norm_squared(),
                None => f64::INFINITY,
            };
            sum_sq += d2;
            max = max.max(d2.sqrt());
        }
        let n = view.image_points.len();
        per_view.push(ViewError {
            rms: if n > 0 { (sum_sq / n as f64).sqrt() } else { 0.0 },
            max,
            points: n,
        });
        total_sq += sum_sq;
        total_points += n;
        total_max = total_max.max(max);
    }

    let rms = if total_points > 0 {
        (total_sq / total_points as f64).sqrt()
    } else {
        0.0
    };
    ReprojectionReport {
        per_view,
        rms,
        max: total_max,
        points: total_points,
    }
}

/// Coarse calibration quality from the pooled RMS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Excellent,
    Good,
    NeedsImprovement,
}

impl QualityBand {
    pub const EXCELLENT_BELOW: f64 = 0.5;
    pub const GOOD_UP_TO: f64 = 1.0;

    pub fn from_rms(rms: f64) -> Self {
        if rms < Self::EXCELLENT_BELOW {
            QualityBand::Excellent
        } else if rms <= Self::GOOD_UP_TO {
            QualityBand::Good
        } else {
            QualityBand::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityBand::Excellent => "excellent",
            QualityBand::Good => "good",
            QualityBand::NeedsImprovement => "needs improvement",
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// User-facing verdict combining the band with the warning threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub band: QualityBand,
    pub warning: bool,
    pub message: String,
}

impl Advice {
    pub fn new(rms: f64, warn_threshold: f64) -> Self {
        let band = QualityBand::from_rms(rms);
        let warning = rms > warn_threshold;
        let message = if warning {
            format!(
                "reprojection error {rms:.4} px exceeds {warn_threshold} px: check the board print quality or add more images"
            )
        } else {
            match band {
                QualityBand::Excellent => {
                    format!("reprojection error {rms:.4} px is very small: excellent calibration")
                }
                QualityBand::Good => {
                    format!("reprojection error {rms:.4} px is within the acceptable range")
                }
                QualityBand::NeedsImprovement => format!(
                    "reprojection error {rms:.4} px is high: add views covering the whole image"
                ),
            }
        };
        Self {
            band,
            warning,
            message,
        }
    }
}
