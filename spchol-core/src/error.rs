//! Error types for the Cholesky engine.

use thiserror::Error;

/// Errors raised by ordering, analysis, factorization and solves.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CholError {
    /// Caller supplied an argument the engine cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Solve vector has the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Symbolic analysis could not produce an elimination tree / column counts
    #[error("Structural failure: {0}")]
    Structural(String),

    /// A pivot was non-positive or non-finite during numeric factorization
    #[error(
        "Matrix is not positive definite: pivot {pivot} at column {column} (original column {original_column})"
    )]
    NotPositiveDefinite {
        /// Column in permuted order
        column: usize,
        /// Same column in the caller's ordering
        original_column: usize,
        /// Offending pivot value
        pivot: f64,
    },
}

/// Coarse classification of [`CholError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Structural,
    NotPositiveDefinite,
}

impl CholError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CholError::InvalidArgument(_) | CholError::DimensionMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            CholError::Structural(_) => ErrorKind::Structural,
            CholError::NotPositiveDefinite { .. } => ErrorKind::NotPositiveDefinite,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CholError::InvalidArgument(msg.into())
    }

    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        CholError::Structural(msg.into())
    }
}

/// Result type for Cholesky operations.
pub type CholResult<T> = Result<T, CholError>;
