//! Collects per-image observations into calibration correspondences.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chesscal_core::ObjectPointSet;
use chesscal_solver::{ImageSize, PlanarView};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::detect::ImageObservation;

/// A rejected image and the reason it was skipped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Attempted vs. accepted counts plus every per-image failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub attempted: usize,
    pub accepted: usize,
    pub failures: Vec<ImageFailure>,
}

/// One accepted image, ready for the estimator.
#[derive(Clone, Debug)]
pub struct AcceptedImage {
    pub index: usize,
    pub path: PathBuf,
    pub size: ImageSize,
    pub view: PlanarView,
}

/// The frozen result of ingestion.
#[derive(Clone, Debug)]
pub struct Correspondences {
    /// Accepted images in discovery order.
    pub accepted: Vec<AcceptedImage>,
    pub diagnostics: Diagnostics,
}

impl Correspondences {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn views(&self) -> Vec<PlanarView> {
        self.accepted.iter().map(|a| a.view.clone()).collect()
    }

    /// Size of the first accepted image; every view is expected to share it.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.accepted.first().map(|a| a.size)
    }
}

#[derive(Default)]
struct State {
    accepted: Vec<AcceptedImage>,
    diagnostics: Diagnostics,
}

/// Thread-safe sink for [`ImageObservation`]s.
///
/// Observations may arrive in any order; [`CorrespondenceAccumulator::finish`]
/// restores discovery order.
pub struct CorrespondenceAccumulator {
    object_points: Arc<ObjectPointSet>,
    state: Mutex<State>,
}

impl CorrespondenceAccumulator {
    pub fn new(object_points: Arc<ObjectPointSet>) -> Self {
        Self {
            object_points,
            state: Mutex::new(State::default()),
        }
    }

    pub fn object_points(&self) -> &Arc<ObjectPointSet> {
        &self.object_points
    }

    /// Record one observation; returns whether it was accepted.
    pub fn ingest(&self, observation: ImageObservation) -> bool {
        let ImageObservation {
            index,
            path,
            size,
            outcome,
        } = observation;
        let expected = self.object_points.len();

        let accepted = match (outcome, size) {
            (Ok(points), Some(size)) if points.len() == expected => Ok(AcceptedImage {
                index,
                path,
                size,
                view: PlanarView {
                    object_points: Arc::clone(&self.object_points),
                    image_points: points,
                },
            }),
            (Ok(points), Some(_)) => Err((
                path,
                format!(
                    "corner detection failed: expected {expected} corners, got {}",
                    points.len()
                ),
            )),
            (Ok(_), None) => Err((path, "image size unknown".to_string())),
            (Err(e), _) => Err((path, e.to_string())),
        };

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.diagnostics.attempted += 1;
        match accepted {
            Ok(image) => {
                debug!("accepted {}", image.path.display());
                state.diagnostics.accepted += 1;
                state.accepted.push(image);
                true
            }
            Err((path, reason)) => {
                warn!("skipping {}: {}", path.display(), reason);
                state.diagnostics.failures.push(ImageFailure { path, reason });
                false
            }
        }
    }

    pub fn attempted(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .diagnostics
            .attempted
    }

    pub fn accepted(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .diagnostics
            .accepted
    }

    /// Freeze the collection: accepted images in discovery order, failures by path.
    pub fn finish(self) -> Correspondences {
        let State {
            mut accepted,
            mut diagnostics,
        } = self.state.into_inner().unwrap_or_else(|p| p.into_inner());
        accepted.sort_by_key(|a| a.index);
        diagnostics.failures.sort_by(|a, b| a.path.cmp(&b.path));
        Correspondences {
            accepted,
            diagnostics,
        }
    }
}
