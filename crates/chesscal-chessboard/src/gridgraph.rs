use std::collections::{HashMap, VecDeque};

use chesscal_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;

use crate::geom::{angle_diff_abs, angle_to_unit, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Two global grid axes in image space: `u` points "right", `v` points "down".
#[derive(Clone, Copy, Debug)]
pub struct GridAxes {
    pub u: Vector2<f32>,
    pub v: Vector2<f32>,
}

impl GridAxes {
    pub fn from_angle(theta_u: f32) -> Self {
        let u = angle_to_unit(theta_u);
        Self {
            u,
            v: Vector2::new(-u.y, u.x),
        }
    }

    fn classify(&self, edge: &Vector2<f32>) -> NeighborDirection {
        let du = edge.dot(&self.u);
        let dv = edge.dot(&self.v);
        if du.abs() >= dv.abs() {
            if du >= 0.0 {
                NeighborDirection::Right
            } else {
                NeighborDirection::Left
            }
        } else if dv >= 0.0 {
            NeighborDirection::Down
        } else {
            NeighborDirection::Up
        }
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    axes: &GridAxes,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // 1. Adjacent corners have orthogonal bright diagonals.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    // 2. Distance must be within expected spacing.
    let vec_to_neighbor = neighbor.position - corner.position;
    let distance = vec_to_neighbor.norm();
    if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
        return None;
    }

    // 3. The edge runs along a grid axis, at 45° to both diagonals.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let expected = std::f32::consts::FRAC_PI_4;
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - expected).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - expected).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    // 4. Direction relative to the global axes.
    let direction = axes.classify(&vec_to_neighbor);

    let score_orientation = (std::f32::consts::FRAC_PI_2
        - angle_diff_abs(corner.orientation, neighbor.orientation))
    .abs();

    Some(NodeNeighbor {
        direction,
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = match candidate.direction {
            NeighborDirection::Right => &mut best[0],
            NeighborDirection::Left => &mut best[1],
            NeighborDirection::Up => &mut best[2],
            NeighborDirection::Down => &mut best[3],
        };

        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };

        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>, // For each node, list of neighbors
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, axes: GridAxes) -> Self {
        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();

        let mut neighbors = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query_point = [corner.position.x, corner.position.y];
            let results = tree.nearest_n::<SquaredEuclidean>(&query_point, params.k_neighbors);

            let mut node_neighbors = Vec::new();
            for nn in results {
                let neighbor_index = nn.item as usize;
                if neighbor_index == i {
                    continue;
                }
                if let Some(entry) = is_good_neighbor(
                    corner,
                    &corners[neighbor_index],
                    neighbor_index,
                    params,
                    &axes,
                ) {
                    node_neighbors.push(entry);
                }
            }
            neighbors.push(select_neighbors(node_neighbors));
        }

        // Keep only links confirmed from the other end with the opposite direction.
        let mutual: Vec<Vec<NodeNeighbor>> = neighbors
            .iter()
            .enumerate()
            .map(|(i, list)| {
                list.iter()
                    .filter(|n| {
                        neighbors[n.index]
                            .iter()
                            .any(|back| back.index == i && back.direction == n.direction.opposite())
                    })
                    .cloned()
                    .collect()
            })
            .collect();

        Self { neighbors: mutual }
    }
}

pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();

    for start in 0..graph.neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for neighbor in &graph.neighbors[node] {
                if !visited[neighbor.index] {
                    stack.push(neighbor.index);
                }
            }
        }

        components.push(component);
    }

    components
}

/// BFS-label a component with integer grid coordinates, origin at its first node.
///
/// Returns `None` when the labelling is inconsistent: a node reached with two
/// different coordinates, or two nodes sharing one cell.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    component: &[usize],
) -> Option<Vec<(usize, GridCoords)>> {
    let start = *component.first()?;
    let mut labels: HashMap<usize, GridCoords> = HashMap::new();
    let mut occupied: HashMap<GridCoords, usize> = HashMap::new();
    let mut queue = VecDeque::new();

    labels.insert(start, GridCoords::new(0, 0));
    occupied.insert(GridCoords::new(0, 0), start);
    queue.push_back(start);

    while let Some(node_idx) = queue.pop_front() {
        let here = labels[&node_idx];
        for neighbor in &graph.neighbors[node_idx] {
            let (di, dj) = neighbor.direction.step();
            let there = GridCoords::new(here.i + di, here.j + dj);
            match labels.get(&neighbor.index) {
                Some(existing) if *existing != there => return None,
                Some(_) => {}
                None => {
                    if occupied.insert(there, neighbor.index).is_some() {
                        return None;
                    }
                    labels.insert(neighbor.index, there);
                    queue.push_back(neighbor.index);
                }
            }
        }
    }

    let mut coords: Vec<(usize, GridCoords)> = labels.into_iter().collect();
    coords.sort_by_key(|&(_, g)| (g.j, g.i));
    Some(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::f32::consts::FRAC_PI_4;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    fn neighbor_map(neighbors: &[NodeNeighbor]) -> HashMap<NeighborDirection, &NodeNeighbor> {
        neighbors.iter().map(|n| (n.direction, n)).collect()
    }

    fn params(k_neighbors: usize) -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: 5.0,
            max_spacing_pix: 15.0,
            k_neighbors,
            ..Default::default()
        }
    }

    fn grid(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    -FRAC_PI_4
                };
                corners.push(make_corner(
                    i as f32 * spacing,
                    j as f32 * spacing,
                    orientation,
                ));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let (cols, spacing) = (3, 10.0);
        let corners = grid(cols, 3, spacing);
        let graph = GridGraph::new(&corners, &params(9), GridAxes::from_angle(0.0));

        let idx = |i: usize, j: usize| j * cols + i;

        let center = neighbor_map(&graph.neighbors[idx(1, 1)]);
        assert_eq!(4, center.len());
        assert_eq!(idx(0, 1), center[&NeighborDirection::Left].index);
        assert_eq!(idx(2, 1), center[&NeighborDirection::Right].index);
        assert_eq!(idx(1, 0), center[&NeighborDirection::Up].index);
        assert_eq!(idx(1, 2), center[&NeighborDirection::Down].index);
        for n in center.values() {
            assert!((n.distance - spacing).abs() < 1e-4);
        }

        let top_left = neighbor_map(&graph.neighbors[idx(0, 0)]);
        assert_eq!(2, top_left.len());
        assert!(top_left.contains_key(&NeighborDirection::Right));
        assert!(top_left.contains_key(&NeighborDirection::Down));
    }

    #[test]
    fn directions_follow_rotated_axes() {
        // Rotate the grid by 90°: image +y becomes the grid's "right".
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(0.0, 10.0, -FRAC_PI_4),
        ];
        let axes = GridAxes::from_angle(std::f32::consts::FRAC_PI_2);
        let graph = GridGraph::new(&corners, &params(2), axes);
        assert_eq!(graph.neighbors[0][0].direction, NeighborDirection::Right);
        assert_eq!(graph.neighbors[1][0].direction, NeighborDirection::Left);
    }

    #[test]
    fn rejects_neighbors_when_orientation_relation_invalid() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(2), GridAxes::from_angle(0.0));
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn rejects_neighbors_outside_distance_window() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(30.0, 0.0, -FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(2), GridAxes::from_angle(0.0));
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn keeps_best_candidate_per_direction() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),          // center (idx 0)
            make_corner(10.0, 0.0, -FRAC_PI_4),        // better right (idx 1)
            make_corner(12.0, 0.0, -FRAC_PI_4 + 0.1),  // worse right (idx 2)
            make_corner(-10.0, 0.0, -FRAC_PI_4),       // left (idx 3)
        ];
        let graph = GridGraph::new(&corners, &params(4), GridAxes::from_angle(0.0));

        let map = neighbor_map(&graph.neighbors[0]);
        assert_eq!(2, map.len());
        assert_eq!(1, map[&NeighborDirection::Right].index);
        assert_eq!(3, map[&NeighborDirection::Left].index);
        // Corner 2 only sees the center through an asymmetric link.
        assert!(graph.neighbors[2].is_empty());
    }

    #[test]
    fn labels_full_component() {
        let (cols, rows) = (4, 3);
        let corners = grid(cols, rows, 10.0);
        let graph = GridGraph::new(&corners, &params(9), GridAxes::from_angle(0.0));

        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);
        let coords = assign_grid_coordinates(&graph, &components[0]).expect("consistent");
        assert_eq!(coords.len(), cols * rows);

        let min_i = coords.iter().map(|(_, g)| g.i).min().unwrap_or(0);
        let min_j = coords.iter().map(|(_, g)| g.j).min().unwrap_or(0);
        for (idx, g) in coords {
            let (i, j) = ((g.i - min_i) as usize, (g.j - min_j) as usize);
            assert_eq!(idx, j * cols + i);
        }
    }

    #[test]
    fn conflicting_labels_invalidate_component() {
        // Node 1 claims node 2 is to its right, while node 0 reaches node 2
        // from below: the two paths disagree on its cell.
        let link = |direction, index| NodeNeighbor {
            direction,
            index,
            distance: 10.0,
            score: 0.0,
        };
        let graph = GridGraph {
            neighbors: vec![
                vec![link(NeighborDirection::Right, 1), link(NeighborDirection::Down, 2)],
                vec![link(NeighborDirection::Left, 0), link(NeighborDirection::Right, 2)],
                vec![link(NeighborDirection::Up, 0), link(NeighborDirection::Left, 1)],
            ],
        };
        assert!(assign_grid_coordinates(&graph, &[0, 1, 2]).is_none());
    }
}
