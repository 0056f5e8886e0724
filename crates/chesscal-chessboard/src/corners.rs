//! Thresholding, non-maximum suppression and corner descriptors on top of the
//! dense ChESS response.

use chesscal_core::{Corner, GrayImageView};
use nalgebra::Point2;

use crate::params::ChessResponseParams;
use crate::response::{chess_response, orientation_at, ResponseMap, RING_RADIUS};

/// Whether `(x, y)` is the unique maximum of its NMS window.
///
/// Ties are broken by raster order: the first pixel of a plateau wins.
fn is_local_max(map: &ResponseMap, x: usize, y: usize, radius: usize) -> bool {
    let v = map.at(x, y);
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = (x + radius).min(map.w - 1);
    let y1 = (y + radius).min(map.h - 1);
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            if nx == x && ny == y {
                continue;
            }
            let n = map.at(nx, ny);
            let before = (ny, nx) < (y, x);
            if n > v || (before && n == v) {
                return false;
            }
        }
    }
    true
}

fn positive_cluster_size(map: &ResponseMap, x: usize, y: usize, radius: usize) -> u32 {
    let mut count = 0;
    for ny in y.saturating_sub(radius)..=(y + radius).min(map.h - 1) {
        for nx in x.saturating_sub(radius)..=(x + radius).min(map.w - 1) {
            if (nx, ny) != (x, y) && map.at(nx, ny) > 0.0 {
                count += 1;
            }
        }
    }
    count
}

/// Center of mass of the positive response in the 3×3 neighbourhood.
fn refine_peak(map: &ResponseMap, x: usize, y: usize) -> Point2<f32> {
    let mut sw = 0.0f32;
    let mut sx = 0.0f32;
    let mut sy = 0.0f32;
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            let w = map.at(nx, ny).max(0.0);
            sw += w;
            sx += w * nx as f32;
            sy += w * ny as f32;
        }
    }
    if sw > 0.0 {
        Point2::new(sx / sw, sy / sw)
    } else {
        Point2::new(x as f32, y as f32)
    }
}

/// Extract corners from a precomputed response map.
pub fn corners_from_response(
    img: &GrayImageView<'_>,
    map: &ResponseMap,
    params: &ChessResponseParams,
) -> Vec<Corner> {
    let max_r = map.max_value();
    if max_r <= 0.0 {
        return Vec::new();
    }
    let threshold = (params.threshold_rel * max_r).max(params.threshold_abs);
    let radius = params.nms_radius.max(1) as usize;
    let border = RING_RADIUS + 1;

    let mut out = Vec::new();
    if map.w <= 2 * border || map.h <= 2 * border {
        return out;
    }
    for y in border..map.h - border {
        for x in border..map.w - border {
            let v = map.at(x, y);
            if v <= threshold || !is_local_max(map, x, y, radius) {
                continue;
            }
            if positive_cluster_size(map, x, y, radius) < params.min_cluster_size {
                continue;
            }
            out.push(Corner {
                position: refine_peak(map, x, y),
                orientation: orientation_at(img, x, y),
                strength: v,
            });
        }
    }

    out.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    out.truncate(params.max_corners);
    out
}

/// Run the ChESS response and extract corner candidates, strongest first.
pub fn detect_chess_corners(img: &GrayImageView<'_>, params: &ChessResponseParams) -> Vec<Corner> {
    let map = chess_response(img);
    corners_from_response(img, &map, params)
}
