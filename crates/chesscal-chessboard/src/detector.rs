use chesscal_core::{Board, Corner, GrayImageView};
use kiddo::{KdTree, SquaredEuclidean};
use log::{debug, info};
use nalgebra::Point2;

use crate::corners::detect_chess_corners;
use crate::error::ChessboardDetectError;
use crate::geom::estimate_grid_axis;
use crate::gridgraph::{assign_grid_coordinates, connected_components, GridAxes, GridGraph};
use crate::ordering::canonical_order;
use crate::params::ChessboardParams;
use crate::response::RING_RADIUS;
use crate::subpix::{effective_half_window, refine_corners};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A fully resolved inner-corner grid.
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    /// Sub-pixel corners in board order: index `j * cols + i`.
    pub corners: Vec<Point2<f32>>,
    /// Number of ChESS candidates the grid was picked from.
    pub candidates: usize,
    /// Smallest distance between adjacent grid corners, in pixels.
    pub min_spacing: f32,
    /// Half window used for sub-pixel refinement.
    pub refine_half_window: usize,
}

/// Chessboard detector for a known inner-corner grid.
pub struct ChessboardDetector {
    board: Board,
    params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(board: Board, params: ChessboardParams) -> Self {
        Self { board, params }
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn params(&self) -> &ChessboardParams {
        &self.params
    }

    /// Detect the board in a grayscale image.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
    ) -> Result<ChessboardDetection, ChessboardDetectError> {
        let min_side = 2 * (RING_RADIUS + 1) + 1;
        if image.width < min_side || image.height < min_side {
            return Err(ChessboardDetectError::ImageTooSmall {
                width: image.width,
                height: image.height,
            });
        }
        let corners = detect_chess_corners(image, &self.params.response);
        debug!("{} ChESS candidates", corners.len());
        self.detect_from_corners(image, &corners)
    }

    /// Resolve the grid from precomputed corner candidates, then refine it
    /// against `image`.
    pub fn detect_from_corners(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Corner],
    ) -> Result<ChessboardDetection, ChessboardDetectError> {
        let (cols, rows) = (self.board.cols(), self.board.rows());
        let needed = cols * rows;
        if corners.len() < needed {
            return Err(ChessboardDetectError::TooFewCorners {
                found: corners.len(),
                needed,
            });
        }

        let theta_u =
            estimate_grid_axis(corners).ok_or(ChessboardDetectError::NoDominantOrientation)?;
        let spacing = median_neighbor_spacing(corners)
            .ok_or(ChessboardDetectError::TooFewCorners { found: corners.len(), needed })?;
        debug!(
            "grid axis {:.1} deg, base spacing {:.1} px",
            theta_u.to_degrees(),
            spacing
        );

        let graph_params = self.params.graph_params(spacing);
        let graph = GridGraph::new(corners, &graph_params, GridAxes::from_angle(theta_u));

        let mut components = connected_components(&graph);
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));
        let largest_component = components.first().map_or(0, Vec::len);

        let not_found = ChessboardDetectError::GridNotFound {
            expected_cols: cols,
            expected_rows: rows,
            largest_component,
        };

        let positions: Vec<Point2<f32>> = corners.iter().map(|c| c.position).collect();
        let mut labelled_any = false;
        for component in components.iter().filter(|c| c.len() == needed) {
            let Some(labelled) = assign_grid_coordinates(&graph, component) else {
                debug!("component of {} corners has conflicting labels", component.len());
                continue;
            };
            labelled_any = true;
            let Some(order) = canonical_order(&labelled, &positions, cols, rows) else {
                continue;
            };

            let mut ordered: Vec<Point2<f32>> = order.iter().map(|&idx| positions[idx]).collect();
            let min_spacing = min_adjacent_spacing(&ordered, cols, rows);
            let half = effective_half_window(&self.params.subpix, min_spacing);
            refine_corners(image, &mut ordered, half, &self.params.subpix);

            info!(
                "found {}x{} grid from {} candidates (spacing {:.1} px, window {})",
                cols,
                rows,
                corners.len(),
                min_spacing,
                2 * half + 1
            );
            return Ok(ChessboardDetection {
                corners: ordered,
                candidates: corners.len(),
                min_spacing,
                refine_half_window: half,
            });
        }

        if labelled_any {
            Err(ChessboardDetectError::OrderingFailed)
        } else {
            Err(not_found)
        }
    }
}

/// Median distance from each corner to its nearest other corner.
fn median_neighbor_spacing(corners: &[Corner]) -> Option<f32> {
    if corners.len() < 2 {
        return None;
    }
    let coords = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect::<Vec<_>>();
    let tree: KdTree<f32, 2> = (&coords).into();

    let mut nearest: Vec<f32> = coords
        .iter()
        .filter_map(|q| {
            tree.nearest_n::<SquaredEuclidean>(q, 2)
                .into_iter()
                .map(|nn| nn.distance)
                .find(|&d| d > 0.0)
                .map(f32::sqrt)
        })
        .collect();
    if nearest.is_empty() {
        return None;
    }
    nearest.sort_by(f32::total_cmp);
    Some(nearest[nearest.len() / 2])
}

fn min_adjacent_spacing(ordered: &[Point2<f32>], cols: usize, rows: usize) -> f32 {
    let mut best = f32::INFINITY;
    for j in 0..rows {
        for i in 0..cols {
            let p = ordered[j * cols + i];
            if i + 1 < cols {
                best = best.min((ordered[j * cols + i + 1] - p).norm());
            }
            if j + 1 < rows {
                best = best.min((ordered[(j + 1) * cols + i] - p).norm());
            }
        }
    }
    best
}
