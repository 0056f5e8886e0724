use serde::{Deserialize, Serialize};

/// ChESS response thresholds and non-maximum suppression.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessResponseParams {
    /// Relative threshold as a fraction of the max response in the image.
    pub threshold_rel: f32,
    /// Absolute threshold; the larger of the two thresholds applies.
    pub threshold_abs: f32,
    /// Non-maximum suppression radius, in pixels.
    pub nms_radius: u32,
    /// Minimum count of positive-response pixels in the NMS window
    /// (rejects isolated noise).
    pub min_cluster_size: u32,
    /// Keep at most this many strongest candidates.
    pub max_corners: usize,
}

impl Default for ChessResponseParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.15,
            threshold_abs: 0.0,
            nms_radius: 2,
            min_cluster_size: 2,
            max_corners: 4096,
        }
    }
}

/// Neighbour search settings for the grid graph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 50.0,
            k_neighbors: 9,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Iterative gradient-covariance corner refinement.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side of the search window; the window is `(2h+1)²` pixels.
    pub half_window: u32,
    /// Upper bound on the window as a fraction of the grid spacing.
    pub max_window_spacing_ratio: f32,
    pub max_iterations: u32,
    /// Stop when the corner moves less than this many pixels.
    pub epsilon: f64,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 11,
            max_window_spacing_ratio: 0.45,
            max_iterations: 30,
            epsilon: 0.001,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub response: ChessResponseParams,

    /// Neighbour candidates queried per corner (the corner itself included).
    pub k_neighbors: usize,

    /// Angular tolerance for the orthogonality and 45° edge checks.
    pub orientation_tolerance_deg: f32,

    /// Spacing window relative to the median nearest-neighbour distance.
    pub min_spacing_factor: f32,
    pub max_spacing_factor: f32,

    pub subpix: SubPixParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            response: ChessResponseParams::default(),
            k_neighbors: 9,
            orientation_tolerance_deg: 22.5,
            min_spacing_factor: 0.5,
            max_spacing_factor: 2.0,
            subpix: SubPixParams::default(),
        }
    }
}

impl ChessboardParams {
    /// Resolve graph parameters for a measured base spacing.
    pub fn graph_params(&self, base_spacing: f32) -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: self.min_spacing_factor * base_spacing,
            max_spacing_pix: self.max_spacing_factor * base_spacing,
            k_neighbors: self.k_neighbors,
            orientation_tolerance_deg: self.orientation_tolerance_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let params: ChessboardParams = serde_json::from_str(
            r#"{ "k_neighbors": 12, "subpix": { "half_window": 5 }, "response": { "nms_radius": 3 } }"#,
        )
        .expect("parse");
        assert_eq!(params.k_neighbors, 12);
        assert_eq!(params.subpix.half_window, 5);
        assert_eq!(params.subpix.max_iterations, SubPixParams::default().max_iterations);
        assert_eq!(params.response.nms_radius, 3);
        assert_eq!(params.response.max_corners, 4096);
        assert_eq!(params.orientation_tolerance_deg, 22.5);
    }

    #[test]
    fn graph_params_scale_with_spacing() {
        let params = ChessboardParams::default();
        let json = serde_json::to_string(&params).expect("serialize");
        let back: ChessboardParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, params);

        let graph = back.graph_params(40.0);
        assert_eq!(graph.min_spacing_pix, 20.0);
        assert_eq!(graph.max_spacing_pix, 80.0);
        assert_eq!(graph.k_neighbors, 9);
    }
}
