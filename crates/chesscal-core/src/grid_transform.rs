use serde::{Deserialize, Serialize};

use crate::GridCoords;

/// Integer 2D grid transform (a 2×2 matrix) used to re-label detected grids.
///
/// This represents a linear transform on integer coordinates:
/// `(i', j') = (a*i + b*j, c*i + d*j)`.
///
/// The 8 elements of the dihedral group `D4` (rotations/reflections on the
/// square grid) are provided in [`GRID_TRANSFORMS_D4`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTransform {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl GridTransform {
    pub const IDENTITY: GridTransform = GridTransform::new(1, 0, 0, 1);

    pub const fn new(a: i32, b: i32, c: i32, d: i32) -> Self {
        Self { a, b, c, d }
    }

    #[inline]
    pub fn apply(&self, g: GridCoords) -> GridCoords {
        GridCoords::new(self.a * g.i + self.b * g.j, self.c * g.i + self.d * g.j)
    }

    /// Whether the transform swaps the i and j extents of a grid.
    #[inline]
    pub fn swaps_axes(&self) -> bool {
        self.a == 0
    }

    pub fn determinant(&self) -> i32 {
        self.a * self.d - self.b * self.c
    }
}

/// The 8 dihedral transforms `D4` on the integer grid.
pub const GRID_TRANSFORMS_D4: [GridTransform; 8] = [
    // rotations: 0°, 90°, 180°, 270°
    GridTransform::new(1, 0, 0, 1),
    GridTransform::new(0, 1, -1, 0),
    GridTransform::new(-1, 0, 0, -1),
    GridTransform::new(0, -1, 1, 0),
    // reflections
    GridTransform::new(-1, 0, 0, 1),
    GridTransform::new(1, 0, 0, -1),
    GridTransform::new(0, 1, 1, 0),
    GridTransform::new(0, -1, -1, 0),
];
