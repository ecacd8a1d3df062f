//! Permuted triangular solves with a Cholesky factor.
//!
//! With `P A P^T = L L^T`, a full solve of `A x = b` runs
//!
//! ```text
//! y = P b        (y[inv_perm[k]] = b[k])
//! L y' = y       forward substitution
//! L^T y'' = y'   backward substitution
//! x = P^T y''    (x[k] = y''[inv_perm[k]])
//! ```
//!
//! [`SolveMode::LowerOnly`] and [`SolveMode::UpperOnly`] run one of the two
//! substitutions between the same permutations, so a full solve equals a
//! lower-only solve followed by an upper-only solve.

use nalgebra::{DVector, DVectorViewMut};
use sprs::CsVec;

use crate::error::{CholError, CholResult};
use crate::numeric::NumericCholesky;
use crate::ordering::Permutation;

/// Which triangular substitutions a solve performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SolveMode {
    /// `A x = b`
    #[default]
    Full,
    /// Forward substitution with `L` only.
    LowerOnly,
    /// Backward substitution with `L^T` only.
    UpperOnly,
}

impl SolveMode {
    fn lower(self) -> bool {
        matches!(self, SolveMode::Full | SolveMode::LowerOnly)
    }

    fn upper(self) -> bool {
        matches!(self, SolveMode::Full | SolveMode::UpperOnly)
    }
}

/// Right-hand side of a solve, overwritten with the solution.
///
/// Dense buffers and vector views are accepted. A sparse vector converts into
/// [`SolveTarget::Sparse`] so that it can be rejected with a clear error.
pub enum SolveTarget<'a> {
    /// Freestanding dense storage.
    Dense(&'a mut [f64]),
    /// Window onto storage owned elsewhere; written back once the solve completes.
    View(DVectorViewMut<'a, f64>),
    /// Sparse vector of the given length.
    Sparse(usize),
}

impl SolveTarget<'_> {
    pub fn len(&self) -> usize {
        match self {
            SolveTarget::Dense(b) => b.len(),
            SolveTarget::View(v) => v.len(),
            SolveTarget::Sparse(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a mut [f64]> for SolveTarget<'a> {
    fn from(b: &'a mut [f64]) -> Self {
        SolveTarget::Dense(b)
    }
}

impl<'a> From<&'a mut Vec<f64>> for SolveTarget<'a> {
    fn from(b: &'a mut Vec<f64>) -> Self {
        SolveTarget::Dense(b.as_mut_slice())
    }
}

impl<'a, const N: usize> From<&'a mut [f64; N]> for SolveTarget<'a> {
    fn from(b: &'a mut [f64; N]) -> Self {
        SolveTarget::Dense(b.as_mut_slice())
    }
}

impl<'a> From<&'a mut DVector<f64>> for SolveTarget<'a> {
    fn from(b: &'a mut DVector<f64>) -> Self {
        SolveTarget::Dense(b.as_mut_slice())
    }
}

impl<'a> From<DVectorViewMut<'a, f64>> for SolveTarget<'a> {
    fn from(v: DVectorViewMut<'a, f64>) -> Self {
        SolveTarget::View(v)
    }
}

impl<'a> From<&'a CsVec<f64>> for SolveTarget<'a> {
    fn from(v: &'a CsVec<f64>) -> Self {
        SolveTarget::Sparse(v.dim())
    }
}

impl<'a> From<&'a mut CsVec<f64>> for SolveTarget<'a> {
    fn from(v: &'a mut CsVec<f64>) -> Self {
        SolveTarget::Sparse(v.dim())
    }
}

/// Solve with the factor of `P A P^T`, overwriting `target` with the result.
///
/// The target is validated before any arithmetic, and it is only written once
/// the substitutions have finished in a call-local work vector.
pub fn solve(
    factor: &NumericCholesky,
    permutation: &Permutation,
    target: SolveTarget<'_>,
    mode: SolveMode,
) -> CholResult<()> {
    let n = factor.n();
    if let SolveTarget::Sparse(_) = target {
        return Err(CholError::invalid(
            "solve requires a dense vector, got a sparse vector",
        ));
    }
    if target.len() != n {
        return Err(CholError::DimensionMismatch {
            expected: n,
            actual: target.len(),
        });
    }

    let mut y = vec![0.0; n];
    match &target {
        SolveTarget::Dense(b) => permutation.gather(b, &mut y),
        SolveTarget::View(v) => {
            let b: Vec<f64> = v.iter().copied().collect();
            permutation.gather(&b, &mut y);
        }
        SolveTarget::Sparse(_) => {}
    }

    if mode.lower() {
        lsolve(factor, &mut y);
    }
    if mode.upper() {
        ltsolve(factor, &mut y);
    }

    match target {
        SolveTarget::Dense(b) => permutation.scatter(&y, b),
        SolveTarget::View(mut v) => {
            let inv_perm = permutation.inv_perm();
            for (k, x) in v.iter_mut().enumerate() {
                *x = y[inv_perm[k]];
            }
        }
        SolveTarget::Sparse(_) => {}
    }
    Ok(())
}

/// Forward substitution `L y = b` in place.
pub fn lsolve(factor: &NumericCholesky, y: &mut [f64]) {
    let (col_ptr, row_idx, values) = (factor.col_ptr(), factor.row_idx(), factor.values());
    for j in 0..factor.n() {
        let start = col_ptr[j];
        y[j] /= values[start];
        let yj = y[j];
        for p in start + 1..col_ptr[j + 1] {
            y[row_idx[p]] -= values[p] * yj;
        }
    }
}

/// Backward substitution `L^T y = b` in place.
pub fn ltsolve(factor: &NumericCholesky, y: &mut [f64]) {
    let (col_ptr, row_idx, values) = (factor.col_ptr(), factor.row_idx(), factor.values());
    for j in (0..factor.n()).rev() {
        let start = col_ptr[j];
        let mut s = y[j];
        for p in start + 1..col_ptr[j + 1] {
            s -= values[p] * y[row_idx[p]];
        }
        y[j] = s / values[start];
    }
}
