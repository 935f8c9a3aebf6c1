use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised during input validation, before any clustering work begins.
///
/// Everything past validation degrades gracefully: numeric edge cases are
/// handled locally and convergence problems surface as non-fatal
/// [`Diagnostic`](crate::cluster::Diagnostic) values on the fitted state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed input data: coordinates out of range, empty dataset,
    /// mismatched weights, and similar pre-flight failures.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested cluster count is outside `(0, n]`.
    #[error("invalid cluster count: requested {requested} clusters for {n_points} points")]
    InvalidClusterCount { requested: usize, n_points: usize },
}

impl Error {
    /// Creates an `InvalidInput` error from any string-like message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
