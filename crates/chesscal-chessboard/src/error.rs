/// Errors returned by the chessboard detector.
///
/// All of them are per-image: the pipeline drops the image and moves on.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ChessboardDetectError {
    #[error("image too small ({width}x{height})")]
    ImageTooSmall { width: usize, height: usize },
    #[error("too few corner candidates (found {found}, need {needed})")]
    TooFewCorners { found: usize, needed: usize },
    #[error("no dominant corner orientation")]
    NoDominantOrientation,
    #[error(
        "{expected_cols}x{expected_rows} grid not found (largest component has {largest_component} corners)"
    )]
    GridNotFound {
        expected_cols: usize,
        expected_rows: usize,
        largest_component: usize,
    },
    #[error("grid could not be put in board order")]
    OrderingFailed,
}
