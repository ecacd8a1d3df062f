//! Left-looking numeric Cholesky factorization.
//!
//! Given a [`SymbolicCholesky`] and the values of a matrix with the same
//! pattern, computes the lower triangular `L` with `P A P^T = L L^T`.
//!
//! The row structure of `L` is laid out first (one elimination-tree walk per
//! row), then every column `j` is computed from the columns `k < j` with
//! `L[j, k] != 0`. No pivoting, scaling or regularization is applied, so a
//! non-positive pivot is reported as an error rather than repaired.

use sprs::CsMat;

use crate::error::{CholError, CholResult};
use crate::linalg::sparse::{CscParts, SparseCsc};
use crate::symbolic::{EliminationTree, RowReach, SymbolicCholesky};

/// Numeric Cholesky factor `L` in compressed column form.
///
/// Row indices are sorted inside each column with the diagonal first, and
/// every diagonal entry is strictly positive and finite.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericCholesky {
    n: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl NumericCholesky {
    /// Factor `a` using a previously computed symbolic analysis.
    ///
    /// `a` only needs its upper triangle; strictly-lower entries are ignored.
    pub fn factor(symbolic: &SymbolicCholesky, a: &CscParts) -> CholResult<Self> {
        let n = symbolic.n();
        let nnz = symbolic.nnz_l();
        let mut numeric = Self {
            n,
            col_ptr: symbolic.column_pointers().to_vec(),
            row_idx: vec![0; nnz],
            values: vec![0.0; nnz],
        };
        numeric.refactor(symbolic, a)?;
        Ok(numeric)
    }

    /// Recompute `L` for a new matrix, reusing the factor's storage.
    ///
    /// On error the stored values are left partially overwritten and the
    /// factor must not be used for solves.
    pub fn refactor(&mut self, symbolic: &SymbolicCholesky, a: &CscParts) -> CholResult<()> {
        let n = symbolic.n();
        if !a.is_square() || a.ncols() != n {
            return Err(CholError::structural(format!(
                "matrix is {}x{} but the symbolic analysis is for n = {}",
                a.nrows(),
                a.ncols(),
                n
            )));
        }
        if self.n != n || self.col_ptr != symbolic.column_pointers() {
            self.n = n;
            self.col_ptr = symbolic.column_pointers().to_vec();
            self.row_idx = vec![0; symbolic.nnz_l()];
            self.values = vec![0.0; symbolic.nnz_l()];
        }

        let c_upper = a.symmetric_permute_upper(symbolic.inv_perm());
        if EliminationTree::build(&c_upper).parent != symbolic.parent() {
            return Err(CholError::structural(
                "matrix pattern does not match the symbolic analysis",
            ));
        }
        let c_lower = c_upper.transpose();

        let mut reach = RowReach::new(n);
        self.fill_pattern(&c_upper, symbolic.parent(), &mut reach)?;
        self.compute_columns(&c_upper, &c_lower, symbolic, &mut reach)
    }

    /// Lay out the row indices of L, one row of the factor at a time.
    fn fill_pattern(
        &mut self,
        c_upper: &CscParts,
        parent: &[Option<usize>],
        reach: &mut RowReach,
    ) -> CholResult<()> {
        let n = self.n;
        let mut next = self.col_ptr[..n].to_vec();

        for i in 0..n {
            self.place(&mut next, i, i)?;
            for &k in reach.reach(c_upper, i, parent)? {
                self.place(&mut next, k, i)?;
            }
        }

        for j in 0..n {
            if next[j] != self.col_ptr[j + 1] {
                return Err(CholError::structural(format!(
                    "column {} of L has {} entries, analysis predicted {}",
                    j,
                    next[j] - self.col_ptr[j],
                    self.col_ptr[j + 1] - self.col_ptr[j]
                )));
            }
        }
        Ok(())
    }

    fn place(&mut self, next: &mut [usize], col: usize, row: usize) -> CholResult<()> {
        let p = next[col];
        if p >= self.col_ptr[col + 1] {
            return Err(CholError::structural(format!(
                "column {} of L overflows its predicted count",
                col
            )));
        }
        self.row_idx[p] = row;
        next[col] += 1;
        Ok(())
    }

    fn compute_columns(
        &mut self,
        c_upper: &CscParts,
        c_lower: &CscParts,
        symbolic: &SymbolicCholesky,
        reach: &mut RowReach,
    ) -> CholResult<()> {
        let n = self.n;
        let parent = symbolic.parent();
        let mut x = vec![0.0; n];
        // Position of the next unused entry below the diagonal in each column
        let mut cursor: Vec<usize> = self.col_ptr[..n].iter().map(|&p| p + 1).collect();

        for j in 0..n {
            let (rows, vals) = c_lower.column(j);
            for (&i, &v) in rows.iter().zip(vals) {
                x[i] += v;
            }

            for &k in reach.reach(c_upper, j, parent)? {
                let p = cursor[k];
                debug_assert_eq!(self.row_idx[p], j);
                let l_jk = self.values[p];
                for q in p..self.col_ptr[k + 1] {
                    x[self.row_idx[q]] -= self.values[q] * l_jk;
                }
                cursor[k] += 1;
            }

            let d = x[j];
            if !(d > 0.0 && d.is_finite()) {
                let original_column = symbolic.perm()[j];
                log::warn!(
                    "cholesky: pivot {:e} at column {} (original {}) is not positive",
                    d,
                    j,
                    original_column
                );
                return Err(CholError::NotPositiveDefinite {
                    column: j,
                    original_column,
                    pivot: d,
                });
            }

            let diag = d.sqrt();
            let start = self.col_ptr[j];
            self.values[start] = diag;
            x[j] = 0.0;
            for q in start + 1..self.col_ptr[j + 1] {
                let i = self.row_idx[q];
                self.values[q] = x[i] / diag;
                x[i] = 0.0;
            }
        }
        Ok(())
    }

    /// Matrix dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Stored nonzeros of L.
    pub fn nnz(&self) -> usize {
        self.row_idx.len()
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Diagonal of L.
    pub fn diagonal(&self) -> Vec<f64> {
        self.col_ptr[..self.n].iter().map(|&p| self.values[p]).collect()
    }

    /// `log det(A) = 2 * sum(log L[j, j])`.
    pub fn log_determinant(&self) -> f64 {
        2.0 * self.col_ptr[..self.n]
            .iter()
            .map(|&p| self.values[p].ln())
            .sum::<f64>()
    }

    /// Copy L into an owned `sprs` CSC matrix.
    pub fn to_csc(&self) -> SparseCsc {
        CsMat::new_csc(
            (self.n, self.n),
            self.col_ptr.clone(),
            self.row_idx.clone(),
            self.values.clone(),
        )
    }
}
