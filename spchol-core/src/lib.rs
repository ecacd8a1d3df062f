//! spchol: sparse Cholesky factorization for symmetric positive definite matrices
//!
//! Factors `P A P^T = L L^T` for a sparse SPD matrix `A` given in compressed
//! column (or row) form and solves `A x = b` with the factor. The work is split
//! into the usual phases:
//!
//! - **Ordering**: natural or approximate minimum degree ([`ordering`])
//! - **Symbolic analysis**: elimination tree and column counts of `L`
//!   ([`symbolic`]), which depend only on the nonzero pattern
//! - **Numeric factorization**: left-looking, with a not-positive-definite
//!   error naming the failing column ([`numeric`])
//! - **Triangular solves**: permuted forward and backward substitution with
//!   partial modes ([`solve`])
//!
//! [`SparseCholesky`] ties the phases together.
//!
//! # Example
//!
//! ```ignore
//! use spchol_core::{OrderingMethod, SparseCholesky};
//! use spchol_core::linalg::sparse;
//!
//! // [[4, 2], [2, 3]]
//! let a = sparse::symmetric_from_upper(2, vec![(0, 0, 4.0), (0, 1, 2.0), (1, 1, 3.0)]);
//! let chol = SparseCholesky::new(&a, OrderingMethod::Amd)?;
//!
//! let mut x = vec![1.0, 1.0];
//! chol.solve(&mut x)?;
//! assert!((x[0] - 0.125).abs() < 1e-14 && (x[1] - 0.25).abs() < 1e-14);
//! ```
//!
//! Only the upper triangle (diagonal included) of the input is read unless
//! [`CholeskySettings::check_symmetry`] is set, in which case asymmetric input
//! is rejected.

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::needless_range_loop)] // index loops mirror the CSC arithmetic

pub mod cholesky;
pub mod error;
pub mod linalg;
pub mod numeric;
pub mod ordering;
pub mod settings;
pub mod solve;
pub mod symbolic;

// Re-export main types
pub use cholesky::{MatrixInput, SparseCholesky};
pub use error::{CholError, CholResult, ErrorKind};
pub use numeric::NumericCholesky;
pub use ordering::{OrderingMethod, Permutation};
pub use settings::CholeskySettings;
pub use solve::{SolveMode, SolveTarget};
pub use symbolic::{EliminationTree, SymbolicCholesky};

/// Factor `a` with the default settings.
///
/// Settings honour the `SPCHOL_*` environment overrides, see
/// [`CholeskySettings`].
pub fn factorize<'a>(a: impl Into<MatrixInput<'a>>) -> CholResult<SparseCholesky> {
    SparseCholesky::with_settings(a, &CholeskySettings::default())
}
