use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Canonical 2D X-junction candidate produced by the ChESS stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Corner position in pixel coordinates.
    pub position: Point2<f32>,

    /// Direction of the bright diagonal through the corner, in radians.
    ///
    /// Defined modulo π because a diagonal is undirected. The two grid axes
    /// through the corner sit at ±45° from it.
    pub orientation: f32,

    /// Response of the corner detector.
    pub strength: f32,
}

/// Integer grid coordinates (i, j) in board space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

impl GridCoords {
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }
}
