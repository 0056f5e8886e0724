//! Chessboard inner-corner detector.
//!
//! Pipeline for one grayscale image:
//! 1. Dense ChESS response, thresholding and non-maximum suppression give
//!    X-junction candidates with a bright-diagonal orientation.
//! 2. The two global grid axes come from the four-fold circular mean of the
//!    orientations; the base spacing is the median nearest-neighbour distance.
//! 3. A k-d tree proposes neighbours; a link is kept when the orientations are
//!    orthogonal, the edge sits at 45° to both diagonals, the distance is within
//!    the spacing window and the far corner agrees on the opposite direction.
//! 4. Connected components are BFS-labelled with integer `(i, j)` cells; a
//!    component must fill the expected `cols × rows` rectangle exactly.
//! 5. The labelling is brought to the board frame (positive handedness, first
//!    corner nearest the image origin) and every corner is refined to
//!    sub-pixel precision.
//!
//! Corners are returned in the same row-major order as
//! [`chesscal_core::Board::object_points`].

mod corners;
mod detector;
mod error;
mod geom;
mod gridgraph;
mod ordering;
mod params;
mod response;
mod subpix;

pub use corners::detect_chess_corners;
pub use detector::{ChessboardDetection, ChessboardDetector};
pub use error::ChessboardDetectError;
pub use gridgraph::{GridAxes, GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{ChessResponseParams, ChessboardParams, GridGraphParams, SubPixParams};
pub use response::{chess_response, ResponseMap};
