/// Errors returned by the parameter estimator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("need at least {needed} views, got {found}")]
    TooFewViews { found: usize, needed: usize },
    #[error("view {view}: {reason}")]
    InvalidView { view: usize, reason: String },
    #[error("initialisation failed for view {view}")]
    Initialisation { view: usize },
    #[error("solver did not converge ({termination} after {evaluations} evaluations)")]
    NonConvergence {
        termination: String,
        evaluations: usize,
    },
    #[error("numerically unstable solution: {reason}")]
    NumericalInstability { reason: String },
}

impl SolveError {
    /// Whether a simpler distortion model is likely to help.
    pub fn suggests_lower_order(&self) -> bool {
        matches!(
            self,
            SolveError::NonConvergence { .. } | SolveError::NumericalInstability { .. }
        )
    }
}
