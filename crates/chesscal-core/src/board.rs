//! Chessboard specification and the canonical board-frame object points.

use std::ops::Deref;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Static chessboard specification.
///
/// `cols`/`rows` are **inner corner** counts, not square counts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub cols: u32,
    pub rows: u32,
    /// Physical square edge length, in millimetres.
    pub square_size_mm: f64,
}

impl Default for BoardSpec {
    fn default() -> Self {
        Self {
            cols: 9,
            rows: 6,
            square_size_mm: 25.0,
        }
    }
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("inner corner grid must be at least 2x2 (got {cols}x{rows})")]
    InvalidSize { cols: u32, rows: u32 },
    #[error("square size must be a positive finite length (got {0})")]
    InvalidSquareSize(f64),
}

/// Validated chessboard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Board {
    spec: BoardSpec,
}

impl Board {
    /// Validate and create a board from a spec.
    pub fn new(spec: BoardSpec) -> Result<Self, BoardError> {
        if spec.cols < 2 || spec.rows < 2 {
            return Err(BoardError::InvalidSize {
                cols: spec.cols,
                rows: spec.rows,
            });
        }
        if !spec.square_size_mm.is_finite() || spec.square_size_mm <= 0.0 {
            return Err(BoardError::InvalidSquareSize(spec.square_size_mm));
        }
        Ok(Self { spec })
    }

    #[inline]
    pub fn spec(&self) -> BoardSpec {
        self.spec
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.spec.cols as usize
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.spec.rows as usize
    }

    #[inline]
    pub fn square_size(&self) -> f64 {
        self.spec.square_size_mm
    }

    /// Number of inner corners, `cols * rows`.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.cols() * self.rows()
    }

    /// Row-major index of the inner corner at `(i, j)`.
    #[inline]
    pub fn corner_index(&self, i: usize, j: usize) -> usize {
        j * self.cols() + i
    }

    /// Canonical board-frame points for this board.
    pub fn object_points(&self) -> ObjectPointSet {
        let s = self.square_size();
        let points = (0..self.rows())
            .flat_map(|j| (0..self.cols()).map(move |i| Point3::new(i as f64 * s, j as f64 * s, 0.0)))
            .collect();
        ObjectPointSet { points }
    }
}

/// Ordered board-frame points on the `z = 0` plane, row-major from corner `(0, 0)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectPointSet {
    points: Vec<Point3<f64>>,
}

impl ObjectPointSet {
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

impl Deref for ObjectPointSet {
    type Target = [Point3<f64>];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

/// Generate the object points `{(i*s, j*s, 0)}` for a `cols x rows` grid.
pub fn generate_object_points(
    cols: u32,
    rows: u32,
    square_size_mm: f64,
) -> Result<ObjectPointSet, BoardError> {
    let board = Board::new(BoardSpec {
        cols,
        rows,
        square_size_mm,
    })?;
    Ok(board.object_points())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major_and_scaled() {
        let pts = generate_object_points(4, 3, 20.0).expect("valid board");
        assert_eq!(pts.len(), 12);
        assert_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Point3::new(20.0, 0.0, 0.0));
        assert_eq!(pts[3], Point3::new(60.0, 0.0, 0.0));
        assert_eq!(pts[4], Point3::new(0.0, 20.0, 0.0));
        assert_eq!(pts[11], Point3::new(60.0, 40.0, 0.0));
        assert!(pts.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn object_points_are_deterministic() {
        for (cols, rows, s) in [(2, 2, 1.0), (9, 6, 25.0), (11, 8, 15.5)] {
            let a = generate_object_points(cols, rows, s).expect("valid");
            let b = generate_object_points(cols, rows, s).expect("valid");
            assert_eq!(a.len(), (cols * rows) as usize);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn corner_index_matches_object_point_order() {
        let board = Board::new(BoardSpec {
            cols: 5,
            rows: 4,
            square_size_mm: 10.0,
        })
        .expect("valid");
        let pts = board.object_points();
        let p = pts[board.corner_index(3, 2)];
        assert_eq!((p.x, p.y), (30.0, 20.0));
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        assert_eq!(
            generate_object_points(1, 6, 25.0),
            Err(BoardError::InvalidSize { cols: 1, rows: 6 })
        );
        assert_eq!(
            generate_object_points(9, 0, 25.0),
            Err(BoardError::InvalidSize { cols: 9, rows: 0 })
        );
        assert!(matches!(
            generate_object_points(9, 6, 0.0),
            Err(BoardError::InvalidSquareSize(_))
        ));
        assert!(matches!(
            generate_object_points(9, 6, f64::NAN),
            Err(BoardError::InvalidSquareSize(_))
        ));
    }
}
