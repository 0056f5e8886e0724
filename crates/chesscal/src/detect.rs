//! Per-image decoding and chessboard detection.

use std::path::{Path, PathBuf};

use chesscal_chessboard::{ChessboardDetectError, ChessboardDetector};
use chesscal_core::GrayImageView;
use chesscal_solver::ImageSize;
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Reasons a single image contributes nothing to the calibration.
#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("cannot read image: {0}")]
    Read(#[from] image::ImageError),
    #[error("corner detection failed: {0}")]
    Detection(#[from] ChessboardDetectError),
    #[error("expected {expected} corners, got {found}")]
    CornerCount { expected: usize, found: usize },
}

/// Outcome of processing one discovered image.
#[derive(Debug)]
pub struct ImageObservation {
    /// Position of the file in discovery order.
    pub index: usize,
    pub path: PathBuf,
    /// Decoded size; `None` when decoding failed.
    pub size: Option<ImageSize>,
    /// Board-ordered sub-pixel corners, or why there are none.
    pub outcome: Result<Vec<Point2<f64>>, ImageError>,
}

impl ImageObservation {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Convert an `image::GrayImage` into the borrowed view used by the detector.
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode `path` and locate the board's inner corners in it.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(detector, path), fields(path = %path.display()))
)]
pub fn observe_image(detector: &ChessboardDetector, index: usize, path: &Path) -> ImageObservation {
    let decoded = match image::open(path) {
        Ok(img) => img.to_luma8(),
        Err(e) => {
            return ImageObservation {
                index,
                path: path.to_path_buf(),
                size: None,
                outcome: Err(e.into()),
            }
        }
    };
    let size = ImageSize {
        width: decoded.width(),
        height: decoded.height(),
    };
    debug!("{}: {}x{}", path.display(), size.width, size.height);

    ImageObservation {
        index,
        path: path.to_path_buf(),
        size: Some(size),
        outcome: detect_corners(detector, &decoded),
    }
}

/// Run the detector on an already decoded image.
pub fn detect_corners(
    detector: &ChessboardDetector,
    img: &image::GrayImage,
) -> Result<Vec<Point2<f64>>, ImageError> {
    let detection = detector.detect(&gray_view(img))?;
    let expected = detector.board().corner_count();
    if detection.corners.len() != expected {
        return Err(ImageError::CornerCount {
            expected,
            found: detection.corners.len(),
        });
    }
    Ok(detection
        .corners
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect())
}
