//! Sparse Cholesky decomposition handle.
//!
//! [`SparseCholesky`] runs ordering, symbolic analysis and numeric
//! factorization once at construction and then answers solves and factor
//! queries. Factor accessors always return owned copies; the handle keeps a
//! lazily built `sprs` copy of `L` that is never handed out by reference.

use std::sync::OnceLock;

use nalgebra::DMatrix;
use sprs::{CompressedStorage, CsMat, CsMatView};

use crate::error::{CholError, CholResult};
use crate::linalg::sparse::{CscParts, SparseCsc};
use crate::numeric::NumericCholesky;
use crate::ordering::{OrderingMethod, Permutation};
use crate::settings::CholeskySettings;
use crate::solve::{self, SolveMode, SolveTarget};
use crate::symbolic::SymbolicCholesky;

/// Matrix handed to the decomposition.
///
/// Only sparse storage can be factored. Dense matrices convert into
/// [`MatrixInput::Dense`] and are rejected with an invalid-argument error.
pub enum MatrixInput<'a> {
    /// `sprs` matrix in CSC or CSR storage.
    Sparse(CsMatView<'a, f64>),
    /// Already validated compressed-column arrays.
    Parts(CscParts),
    Dense(&'a DMatrix<f64>),
}

impl<'a> From<&'a CsMat<f64>> for MatrixInput<'a> {
    fn from(a: &'a CsMat<f64>) -> Self {
        MatrixInput::Sparse(a.view())
    }
}

impl<'a> From<CsMatView<'a, f64>> for MatrixInput<'a> {
    fn from(a: CsMatView<'a, f64>) -> Self {
        MatrixInput::Sparse(a)
    }
}

impl From<CscParts> for MatrixInput<'_> {
    fn from(a: CscParts) -> Self {
        MatrixInput::Parts(a)
    }
}

impl<'a> From<&'a DMatrix<f64>> for MatrixInput<'a> {
    fn from(a: &'a DMatrix<f64>) -> Self {
        MatrixInput::Dense(a)
    }
}

impl MatrixInput<'_> {
    /// Normalize to column-compressed parts, remembering the input storage.
    fn into_parts(self, check_symmetry: bool) -> CholResult<(CscParts, CompressedStorage)> {
        let (parts, storage) = match self {
            MatrixInput::Sparse(a) => {
                let storage = a.storage();
                (CscParts::from_sprs(a), storage)
            }
            MatrixInput::Parts(a) => (a, CompressedStorage::CSC),
            MatrixInput::Dense(a) => {
                return Err(CholError::invalid(format!(
                    "sparse Cholesky requires a compressed sparse matrix, got a dense {}x{} matrix",
                    a.nrows(),
                    a.ncols()
                )))
            }
        };

        if !parts.is_square() {
            return Err(CholError::invalid(format!(
                "Matrix must be square, got {}x{}",
                parts.nrows(),
                parts.ncols()
            )));
        }
        if check_symmetry {
            if let Some((i, j)) = parts.find_asymmetry() {
                return Err(CholError::invalid(format!(
                    "matrix is not symmetric: entry ({}, {}) has no matching ({}, {})",
                    i, j, j, i
                )));
            }
        }
        Ok((parts, storage))
    }
}

/// Sparse Cholesky decomposition `P A P^T = L L^T` of an SPD matrix.
///
/// # Example
///
/// ```ignore
/// use spchol_core::{OrderingMethod, SparseCholesky};
///
/// let chol = SparseCholesky::new(&a, OrderingMethod::Amd)?;
/// let mut x = b.clone();
/// chol.solve(&mut x)?;
/// ```
#[derive(Debug, Clone)]
pub struct SparseCholesky {
    n: usize,
    ordering: Option<OrderingMethod>,
    storage: CompressedStorage,
    check_symmetry: bool,
    verbose: bool,
    symbolic: SymbolicCholesky,
    numeric: NumericCholesky,
    /// Set when a refactorization failed; the numeric factor is then stale.
    failure: Option<CholError>,
    factor: OnceLock<SparseCsc>,
}

impl SparseCholesky {
    /// Factor `a` with the given ordering.
    pub fn new<'a>(a: impl Into<MatrixInput<'a>>, ordering: OrderingMethod) -> CholResult<Self> {
        let settings = CholeskySettings {
            ordering,
            check_symmetry: false,
            verbose: false,
        };
        Self::with_settings(a, &settings)
    }

    /// Factor `a` with an integer ordering mode (0 natural, 1 AMD).
    ///
    /// The mode is validated before the matrix is looked at.
    pub fn with_mode<'a>(a: impl Into<MatrixInput<'a>>, mode: i32) -> CholResult<Self> {
        let ordering = OrderingMethod::try_from(mode)?;
        Self::new(a, ordering)
    }

    pub fn with_settings<'a>(
        a: impl Into<MatrixInput<'a>>,
        settings: &CholeskySettings,
    ) -> CholResult<Self> {
        let input: MatrixInput<'a> = a.into();
        let (parts, storage) = input.into_parts(settings.check_symmetry)?;
        let symbolic = SymbolicCholesky::analyze(&parts, settings.ordering)?;
        Self::factor(
            &parts,
            storage,
            symbolic,
            Some(settings.ordering),
            settings.check_symmetry,
            settings.verbose,
        )
    }

    /// Factor `a` reusing an existing symbolic analysis.
    ///
    /// `a` must have the pattern the analysis was computed for, otherwise a
    /// structural error is returned.
    pub fn from_symbolic<'a>(
        a: impl Into<MatrixInput<'a>>,
        symbolic: SymbolicCholesky,
    ) -> CholResult<Self> {
        let settings = CholeskySettings {
            ordering: OrderingMethod::default(),
            check_symmetry: false,
            verbose: false,
        };
        Self::from_symbolic_with_settings(a, symbolic, &settings)
    }

    /// [`SparseCholesky::from_symbolic`] honoring `check_symmetry` and `verbose`.
    ///
    /// `settings.ordering` is ignored; the permutation comes from `symbolic`.
    /// The symmetry setting also applies to later [`SparseCholesky::refactor`] calls.
    pub fn from_symbolic_with_settings<'a>(
        a: impl Into<MatrixInput<'a>>,
        symbolic: SymbolicCholesky,
        settings: &CholeskySettings,
    ) -> CholResult<Self> {
        let input: MatrixInput<'a> = a.into();
        let (parts, storage) = input.into_parts(settings.check_symmetry)?;
        if parts.ncols() != symbolic.n() {
            return Err(CholError::structural(format!(
                "matrix has dimension {} but the symbolic analysis is for n = {}",
                parts.ncols(),
                symbolic.n()
            )));
        }
        Self::factor(
            &parts,
            storage,
            symbolic,
            None,
            settings.check_symmetry,
            settings.verbose,
        )
    }

    fn factor(
        parts: &CscParts,
        storage: CompressedStorage,
        symbolic: SymbolicCholesky,
        ordering: Option<OrderingMethod>,
        check_symmetry: bool,
        verbose: bool,
    ) -> CholResult<Self> {
        let numeric = NumericCholesky::factor(&symbolic, parts)?;

        let n = symbolic.n();
        if verbose {
            log::info!(
                "cholesky: n = {}, nnz(A) = {}, nnz(L) = {}, etree height = {}",
                n,
                parts.nnz(),
                numeric.nnz(),
                symbolic.tree_height()
            );
        }

        Ok(Self {
            n,
            ordering,
            storage,
            check_symmetry,
            verbose,
            symbolic,
            numeric,
            failure: None,
            factor: OnceLock::new(),
        })
    }

    /// Refactor a new matrix with the same pattern, keeping the symbolic analysis.
    ///
    /// Errors raised before any numeric work leave the handle untouched. If the
    /// numeric phase fails, the handle keeps the error and every later solve or
    /// factor access returns it until a refactorization succeeds.
    pub fn refactor<'a>(&mut self, a: impl Into<MatrixInput<'a>>) -> CholResult<()> {
        let input: MatrixInput<'a> = a.into();
        let (parts, storage) = input.into_parts(self.check_symmetry)?;
        if parts.ncols() != self.n {
            return Err(CholError::structural(format!(
                "matrix has dimension {} but the factorization is for n = {}",
                parts.ncols(),
                self.n
            )));
        }

        self.factor.take();
        match self.numeric.refactor(&self.symbolic, &parts) {
            Ok(()) => {
                self.failure = None;
                self.storage = storage;
                if self.verbose {
                    log::info!("cholesky: refactored n = {}", self.n);
                }
                Ok(())
            }
            Err(err) => {
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn numeric(&self) -> CholResult<&NumericCholesky> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(&self.numeric),
        }
    }

    fn cached_factor(&self) -> CholResult<&SparseCsc> {
        let numeric = self.numeric()?;
        Ok(self.factor.get_or_init(|| numeric.to_csc()))
    }

    /// Independent copy of `L`, in the storage order of the input matrix.
    pub fn l(&self) -> CholResult<SparseCsc> {
        let l = self.cached_factor()?;
        Ok(match self.storage {
            CompressedStorage::CSC => l.clone(),
            CompressedStorage::CSR => l.to_other_storage(),
        })
    }

    /// Independent copy of `L^T`, in the storage order of the input matrix.
    pub fn l_transpose(&self) -> CholResult<SparseCsc> {
        let l = self.cached_factor()?;
        Ok(match self.storage {
            CompressedStorage::CSC => l.transpose_view().to_other_storage(),
            CompressedStorage::CSR => l.transpose_view().to_owned(),
        })
    }

    /// Copy of the symbolic analysis, reusable with [`SparseCholesky::from_symbolic`].
    pub fn symbolic(&self) -> SymbolicCholesky {
        self.symbolic.clone()
    }

    pub fn permutation(&self) -> &Permutation {
        self.symbolic.permutation()
    }

    /// Solve `A x = b`, overwriting `b` with `x`.
    pub fn solve<'b>(&self, b: impl Into<SolveTarget<'b>>) -> CholResult<()> {
        self.solve_with_mode(b, SolveMode::Full)
    }

    /// Solve with a subset of the triangular substitutions.
    pub fn solve_with_mode<'b>(
        &self,
        b: impl Into<SolveTarget<'b>>,
        mode: SolveMode,
    ) -> CholResult<()> {
        let numeric = self.numeric()?;
        solve::solve(numeric, self.symbolic.permutation(), b.into(), mode)
    }

    /// Solve `A x = b` into a new vector.
    pub fn solve_vec(&self, b: &[f64]) -> CholResult<Vec<f64>> {
        let mut x = b.to_vec();
        self.solve(&mut x)?;
        Ok(x)
    }

    /// Solve every column of `b` in place.
    pub fn solve_many(&self, b: &mut DMatrix<f64>) -> CholResult<()> {
        if b.nrows() != self.n {
            return Err(CholError::DimensionMismatch {
                expected: self.n,
                actual: b.nrows(),
            });
        }
        for j in 0..b.ncols() {
            self.solve(b.column_mut(j))?;
        }
        Ok(())
    }

    /// `log det(A)`.
    pub fn log_determinant(&self) -> CholResult<f64> {
        Ok(self.numeric()?.log_determinant())
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Nonzeros of `L`, diagonal included.
    pub fn nnz_l(&self) -> usize {
        self.symbolic.nnz_l()
    }

    /// Ordering used, or `None` when the analysis was supplied by the caller.
    pub fn ordering(&self) -> Option<OrderingMethod> {
        self.ordering
    }
}
