//! Core types and utilities for chessboard camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image decoder or solver; the detector, the estimator and the
//! pipeline crates build on the types defined here.

mod board;
mod corner;
mod distortion;
mod grid_transform;
mod homography;
mod image;
mod logger;
pub mod synthetic;

pub use board::{generate_object_points, Board, BoardError, BoardSpec, ObjectPointSet};
pub use corner::{Corner, GridCoords};
pub use distortion::{DistortionOrder, UnsupportedDistortionOrder, DISTORTION_TERM_NAMES};
pub use grid_transform::{GridTransform, GRID_TRANSFORMS_D4};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
