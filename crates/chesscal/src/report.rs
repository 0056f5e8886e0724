//! Final calibration result and the JSON report persisted for it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chesscal_core::DistortionOrder;
use chesscal_solver::{Advice, CalibrationSolution, Intrinsics, QualityBand, ReprojectionReport};
use chrono::{DateTime, Local};
use log::info;
use nalgebra::Matrix3;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::accumulator::{Correspondences, Diagnostics};
use crate::config::CalibrationPlan;

/// Timestamp layout inside the report.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Report file name layout.
pub const REPORT_FILE_FORMAT: &str = "camera_calibration_%Y_%m_%d_%H_%M_%S.json";

const PIXEL_FOCAL_NOTE: &str =
    "fx and fy are focal lengths in pixels; they differ from the physical focal length in mm";

#[derive(thiserror::Error, Debug)]
pub enum ReportIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Immutable numeric outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera_matrix: Matrix3<f64>,
    pub distortion_order: DistortionOrder,
    /// Exactly `distortion_order` coefficients in OpenCV order.
    pub distortion: Vec<f64>,
    /// One value per accepted image, in discovery order.
    pub per_image_rms: Vec<f64>,
    pub rms: f64,
    pub images_used: usize,
    pub timestamp: DateTime<Local>,
}

impl CalibrationResult {
    pub fn assemble(
        solution: &CalibrationSolution,
        reprojection: &ReprojectionReport,
        timestamp: DateTime<Local>,
    ) -> Self {
        let distortion = &solution.camera.distortion;
        Self {
            camera_matrix: solution.camera.intrinsics.matrix(),
            distortion_order: distortion.order(),
            distortion: distortion.coefficients().to_vec(),
            per_image_rms: reprojection.per_view_rms(),
            rms: reprojection.rms,
            images_used: reprojection.per_view.len(),
            timestamp,
        }
    }

    pub fn intrinsics(&self) -> Intrinsics {
        let k = &self.camera_matrix;
        Intrinsics {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn quality(&self) -> QualityBand {
        QualityBand::from_rms(self.rms)
    }

    /// `camera_calibration_<timestamp>.json`.
    pub fn report_file_name(&self) -> String {
        self.timestamp.format(REPORT_FILE_FORMAT).to_string()
    }
}

/// Distortion coefficients keyed by term name, in model order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistortionTerms(pub Vec<(String, f64)>);

impl DistortionTerms {
    pub fn new(order: DistortionOrder, coefficients: &[f64]) -> Self {
        Self(
            order
                .term_names()
                .iter()
                .zip(coefficients)
                .map(|(name, &c)| ((*name).to_string(), c))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|&(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DistortionTerms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DistortionTerms {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TermsVisitor;

        impl<'de> Visitor<'de> for TermsVisitor {
            type Value = DistortionTerms;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of distortion term names to coefficients")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut terms = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    terms.push((name, value));
                }
                Ok(DistortionTerms(terms))
            }
        }

        deserializer.deserialize_map(TermsVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraSection {
    pub focal_length_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSection {
    /// `"<cols>x<rows>"`.
    pub inner_corners: String,
    pub square_size_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsSection {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub note: String,
    /// Row-major camera matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[[f64; 3]; 3]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistortionSection {
    pub terms: DistortionTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRms {
    pub image: PathBuf,
    pub rms: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSection {
    pub rms_error: f64,
    pub distortion_order: DistortionOrder,
    pub quality: QualityBand,
    pub advice: Advice,
    pub intrinsics: IntrinsicsSection,
    pub distortion: DistortionSection,
    pub per_image_rms: Vec<ImageRms>,
}

/// The persisted calibration artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub timestamp: String,
    pub camera: CameraSection,
    pub board: BoardSection,
    pub result: ResultSection,
    pub images_used: usize,
    pub diagnostics: Diagnostics,
}

impl CalibrationReport {
    pub fn new(
        plan: &CalibrationPlan,
        result: &CalibrationResult,
        reprojection: &ReprojectionReport,
        correspondences: &Correspondences,
    ) -> Self {
        let k = result.intrinsics();
        let matrix = plan.save_full_matrix.then(|| {
            let m = &result.camera_matrix;
            [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ]
        });
        let per_image_rms = correspondences
            .accepted
            .iter()
            .zip(&reprojection.per_view)
            .map(|(image, err)| ImageRms {
                image: image.path.clone(),
                rms: err.rms,
                max: err.max,
            })
            .collect();

        Self {
            timestamp: result.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            camera: CameraSection {
                focal_length_mm: plan.focal_length_mm,
            },
            board: BoardSection {
                inner_corners: format!("{}x{}", plan.board.cols(), plan.board.rows()),
                square_size_mm: plan.board.square_size(),
            },
            result: ResultSection {
                rms_error: result.rms,
                distortion_order: result.distortion_order,
                quality: result.quality(),
                advice: Advice::new(result.rms, plan.rms_warn_threshold),
                intrinsics: IntrinsicsSection {
                    fx: k.fx,
                    fy: k.fy,
                    cx: k.cx,
                    cy: k.cy,
                    note: PIXEL_FOCAL_NOTE.to_string(),
                    matrix,
                },
                distortion: DistortionSection {
                    terms: DistortionTerms::new(result.distortion_order, &result.distortion),
                    coefficients: plan
                        .save_full_distortion
                        .then(|| result.distortion.clone()),
                },
                per_image_rms,
            },
            images_used: result.images_used,
            diagnostics: correspondences.diagnostics.clone(),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportIoError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportIoError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Write into `dir` under `file_name`, creating the directory if needed.
    pub fn save_in(&self, dir: impl AsRef<Path>, file_name: &str) -> Result<PathBuf, ReportIoError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        self.write_json(&path)?;
        info!("calibration report written to {}", path.display());
        Ok(path)
    }

    /// Multi-line summary for terminal output.
    pub fn summary(&self) -> String {
        let r = &self.result;
        let k = &r.intrinsics;
        let mut out = String::new();
        out.push_str(&format!("calibration {}\n", self.timestamp));
        out.push_str(&format!(
            "  board {} inner corners, {} mm squares\n",
            self.board.inner_corners, self.board.square_size_mm
        ));
        out.push_str(&format!(
            "  images used: {} of {} attempted\n",
            self.images_used, self.diagnostics.attempted
        ));
        out.push_str(&format!(
            "  rms reprojection error: {:.4} px ({})\n",
            r.rms_error, r.quality
        ));
        out.push_str(&format!(
            "  fx={:.2} fy={:.2} cx={:.2} cy={:.2}\n",
            k.fx, k.fy, k.cx, k.cy
        ));
        out.push_str(&format!("  distortion ({} terms):\n", r.distortion_order));
        for (name, value) in &r.distortion.terms.0 {
            out.push_str(&format!("    {name}: {value:.6}\n"));
        }
        out.push_str(&format!("  {}", r.advice.message));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> CalibrationResult {
        CalibrationResult {
            camera_matrix: Matrix3::new(
                812.4731902216, 0.0, 321.1870337, 0.0, 809.6642180051, 238.40918233, 0.0, 0.0, 1.0,
            ),
            distortion_order: DistortionOrder::Eight,
            distortion: vec![
                -0.2831907344118,
                0.09176214339,
                0.00110340718,
                -0.000477120936,
                0.015331827101,
                0.0071146,
                -0.00198130226,
                0.000522910047,
            ],
            per_image_rms: vec![0.11141452601527099, 0.3721950183, 0.1903],
            rms: 0.2639470812753,
            images_used: 3,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn result_json_round_trip() {
        let r = result();
        let json = serde_json::to_string(&r).expect("serialize");
        let back: CalibrationResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
    }

    #[test]
    fn intrinsics_come_from_the_matrix() {
        let k = result().intrinsics();
        assert_eq!(
            (k.fx, k.fy, k.cx, k.cy),
            (812.4731902216, 809.6642180051, 321.1870337, 238.40918233)
        );
    }

    #[test]
    fn distortion_terms_keep_model_order() {
        let r = result();
        let terms = DistortionTerms::new(r.distortion_order, &r.distortion);
        assert_eq!(terms.len(), 8);
        let json = serde_json::to_string(&terms).expect("serialize");
        let k1 = json.find("\"k1\"").expect("k1");
        let p1 = json.find("\"p1\"").expect("p1");
        let k6 = json.find("\"k6\"").expect("k6");
        assert!(k1 < p1 && p1 < k6);
        assert!(json.find("\"s1\"").is_none());

        let back: DistortionTerms = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, terms);
        assert_eq!(back.get("k3"), Some(0.015331827101));
    }

    #[test]
    fn file_name_follows_timestamp() {
        let mut r = result();
        r.timestamp = chrono::TimeZone::with_ymd_and_hms(&Local, 2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous time");
        assert_eq!(r.report_file_name(), "camera_calibration_2024_03_09_14_05_07.json");
        assert_eq!(
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "2024-03-09 14:05:07"
        );
    }
}
