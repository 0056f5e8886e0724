//! Canonical board-frame ordering of a labelled grid.

use chesscal_core::{GridCoords, GridTransform, GRID_TRANSFORMS_D4};
use nalgebra::Point2;

/// Re-label `labelled` (corner index + grid cell) into the canonical frame and
/// return corner indices in row-major order `j * cols + i`.
///
/// Of the dihedral relabellings that span `cols × rows` with the i-axis
/// crossed into the j-axis being positive in image space, the one whose first
/// corner is closest to the image origin wins. Returns `None` when the cells
/// do not fill a `cols × rows` rectangle.
pub fn canonical_order(
    labelled: &[(usize, GridCoords)],
    positions: &[Point2<f32>],
    cols: usize,
    rows: usize,
) -> Option<Vec<usize>> {
    if labelled.len() != cols * rows {
        return None;
    }

    let mut best: Option<(Vec<usize>, (f32, f32, f32))> = None;
    for transform in GRID_TRANSFORMS_D4 {
        let Some(order) = relabel(labelled, transform, cols, rows) else {
            continue;
        };

        let origin = positions[order[0]];
        let along_i = positions[order[cols - 1]] - origin;
        let along_j = positions[order[(rows - 1) * cols]] - origin;
        if along_i.perp(&along_j) <= 0.0 {
            continue;
        }

        let key = (origin.x + origin.y, origin.y, origin.x);
        let better = match &best {
            None => true,
            Some((_, best_key)) => key < *best_key,
        };
        if better {
            best = Some((order, key));
        }
    }

    best.map(|(order, _)| order)
}

fn relabel(
    labelled: &[(usize, GridCoords)],
    transform: GridTransform,
    cols: usize,
    rows: usize,
) -> Option<Vec<usize>> {
    let mapped: Vec<(usize, GridCoords)> = labelled
        .iter()
        .map(|&(idx, g)| (idx, transform.apply(g)))
        .collect();
    let min_i = mapped.iter().map(|(_, g)| g.i).min()?;
    let min_j = mapped.iter().map(|(_, g)| g.j).min()?;

    let mut slots: Vec<Option<usize>> = vec![None; cols * rows];
    for (idx, g) in mapped {
        let i = (g.i - min_i) as usize;
        let j = (g.j - min_j) as usize;
        if i >= cols || j >= rows {
            return None;
        }
        let slot = &mut slots[j * cols + i];
        if slot.is_some() {
            return None;
        }
        *slot = Some(idx);
    }
    slots.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Corners of a `cols × rows` grid laid out in image space by `place`,
    /// stored in scrambled order and labelled with the given cell mapping.
    fn scene(
        cols: usize,
        rows: usize,
        place: impl Fn(usize, usize) -> (f32, f32),
        label: impl Fn(usize, usize) -> GridCoords,
    ) -> (Vec<Point2<f32>>, Vec<(usize, GridCoords)>, Vec<usize>) {
        let n = cols * rows;
        // storage slot of canonical corner k
        let slot_of = |k: usize| (k * 7 + 3) % n;
        let mut positions = vec![Point2::origin(); n];
        let mut labelled = Vec::new();
        let mut expected = vec![0; n];
        for j in 0..rows {
            for i in 0..cols {
                let k = j * cols + i;
                let (x, y) = place(i, j);
                positions[slot_of(k)] = Point2::new(x, y);
                labelled.push((slot_of(k), label(i, j)));
                expected[k] = slot_of(k);
            }
        }
        (positions, labelled, expected)
    }

    #[test]
    fn upright_board_keeps_raster_order() {
        let (cols, rows) = (5, 4);
        let (pos, labelled, expected) = scene(
            cols,
            rows,
            |i, j| (100.0 + 20.0 * i as f32, 50.0 + 20.0 * j as f32),
            |i, j| GridCoords::new(i as i32, j as i32),
        );
        assert_eq!(canonical_order(&labelled, &pos, cols, rows), Some(expected));
    }

    #[test]
    fn rotated_labels_are_brought_back() {
        let (cols, rows) = (5, 4);
        // The graph labelled the board with transposed, mirrored axes.
        let (pos, labelled, expected) = scene(
            cols,
            rows,
            |i, j| (100.0 + 20.0 * i as f32, 50.0 + 20.0 * j as f32),
            |i, j| GridCoords::new(-(j as i32) + 7, i as i32 - 2),
        );
        assert_eq!(canonical_order(&labelled, &pos, cols, rows), Some(expected));
    }

    #[test]
    fn upside_down_board_starts_near_image_origin() {
        let (cols, rows) = (5, 4);
        // Board rotated 180° in the image: canonical (0,0) sits at the
        // bottom-right. The chosen ordering must start top-left instead.
        let (pos, labelled, _) = scene(
            cols,
            rows,
            |i, j| (300.0 - 20.0 * i as f32, 200.0 - 20.0 * j as f32),
            |i, j| GridCoords::new(i as i32, j as i32),
        );
        let order = canonical_order(&labelled, &pos, cols, rows).expect("ordering");
        let first = pos[order[0]];
        assert_eq!((first.x, first.y), (220.0, 140.0));
        let second = pos[order[1]];
        assert!(second.x > first.x);
        let next_row = pos[order[cols]];
        assert!(next_row.y > first.y);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let (pos, labelled, _) = scene(
            6,
            3,
            |i, j| (20.0 * i as f32, 20.0 * j as f32),
            |i, j| GridCoords::new(i as i32, j as i32),
        );
        // 18 corners, but 9 × 2 requested.
        assert_eq!(canonical_order(&labelled, &pos, 9, 2), None);
    }
}
