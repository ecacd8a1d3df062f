//! Sparse matrix types and operations.
//!
//! Inputs arrive as `sprs` matrices in either storage order. The factorization
//! kernels work on [`CscParts`], an owned and validated set of compressed
//! column arrays, so every index they read has been checked against the
//! dimension once, up front.

use sprs::{CsMat, CsMatView, TriMat};

use crate::error::{CholError, CholResult};

/// Sparse matrix in CSC format (general, not necessarily symmetric).
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate triplets are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a full symmetric CSC matrix from upper triangle triplets.
///
/// Each off-diagonal triplet `(i, j, v)` with `i < j` is mirrored to `(j, i, v)`,
/// so the result stores both triangles.
pub fn symmetric_from_upper<I>(n: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((n, n));
    for (i, j, v) in triplets {
        assert!(j >= i, "Symmetric matrix must only contain upper triangle");
        tri.add_triplet(i, j, v);
        if i != j {
            tri.add_triplet(j, i, v);
        }
    }
    tri.to_csc()
}

/// Create a diagonal matrix in CSC format.
pub fn diagonal(diag: &[f64]) -> SparseCsc {
    let n = diag.len();
    let triplets = diag.iter().enumerate().map(|(i, &v)| (i, i, v));
    from_triplets(n, n, triplets)
}

/// Create an identity matrix in CSC format.
pub fn identity(n: usize) -> SparseCsc {
    diagonal(&vec![1.0; n])
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    // Scale y by beta
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    // Add alpha * A * x
    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Owned compressed-column arrays with validated indices.
///
/// Entries inside a column need not be sorted. Duplicates are allowed and
/// behave as if summed.
#[derive(Debug, Clone, PartialEq)]
pub struct CscParts {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscParts {
    /// Validate raw compressed-column arrays.
    ///
    /// Fails with a structural error when the column pointers are not a
    /// non-decreasing sequence from 0 to the entry count, or a row index falls
    /// outside `[0, nrows)`.
    pub fn from_raw(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> CholResult<Self> {
        if col_ptr.len() != ncols + 1 {
            return Err(CholError::structural(format!(
                "column pointer length {} != ncols + 1 = {}",
                col_ptr.len(),
                ncols + 1
            )));
        }
        if col_ptr[0] != 0 {
            return Err(CholError::structural("first column pointer must be 0"));
        }
        if let Some(j) = col_ptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(CholError::structural(format!(
                "column pointers decrease at column {}",
                j
            )));
        }
        let nnz = col_ptr[ncols];
        if row_idx.len() != nnz || values.len() != nnz {
            return Err(CholError::structural(format!(
                "column pointers announce {} entries but found {} row indices and {} values",
                nnz,
                row_idx.len(),
                values.len()
            )));
        }
        if let Some(p) = row_idx.iter().position(|&i| i >= nrows) {
            return Err(CholError::structural(format!(
                "row index {} at position {} out of range for {} rows",
                row_idx[p], p, nrows
            )));
        }

        Ok(Self {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            values,
        })
    }

    /// Copy an `sprs` matrix into column-compressed parts.
    ///
    /// CSR storage is converted to CSC first.
    pub fn from_sprs(mat: CsMatView<'_, f64>) -> Self {
        let csc;
        let mat = if mat.is_csc() {
            mat
        } else {
            csc = mat.to_other_storage();
            csc.view()
        };

        let (nrows, ncols) = mat.shape();
        let mut col_ptr = Vec::with_capacity(ncols + 1);
        let mut row_idx = Vec::with_capacity(mat.nnz());
        let mut values = Vec::with_capacity(mat.nnz());
        col_ptr.push(0);
        for col in mat.outer_iterator() {
            for (i, &v) in col.iter() {
                row_idx.push(i);
                values.push(v);
            }
            col_ptr.push(row_idx.len());
        }

        Self {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Number of stored entries.
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

    /// Row indices and values of column `j`.
    pub fn column(&self, j: usize) -> (&[usize], &[f64]) {
        let range = self.col_ptr[j]..self.col_ptr[j + 1];
        (&self.row_idx[range.clone()], &self.values[range])
    }

    /// Transpose by counting sort. Row indices of the result are sorted.
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.nrows + 1];
        for &i in &self.row_idx {
            counts[i + 1] += 1;
        }
        for i in 0..self.nrows {
            counts[i + 1] += counts[i];
        }
        let col_ptr = counts.clone();
        let mut next = counts;

        let mut row_idx = vec![0usize; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        for j in 0..self.ncols {
            for p in self.col_ptr[j]..self.col_ptr[j + 1] {
                let q = next[self.row_idx[p]];
                next[self.row_idx[p]] += 1;
                row_idx[q] = j;
                values[q] = self.values[p];
            }
        }

        Self {
            nrows: self.ncols,
            ncols: self.nrows,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Upper triangle of `P A P^T` for a square matrix.
    ///
    /// Only entries with `row <= col` are read; `inv_perm[old] = new`.
    pub fn symmetric_permute_upper(&self, inv_perm: &[usize]) -> Self {
        debug_assert!(self.is_square());
        debug_assert_eq!(inv_perm.len(), self.ncols);
        let n = self.ncols;

        let mut counts = vec![0usize; n + 1];
        for j in 0..n {
            let j2 = inv_perm[j];
            for &i in &self.row_idx[self.col_ptr[j]..self.col_ptr[j + 1]] {
                if i > j {
                    continue;
                }
                counts[inv_perm[i].max(j2) + 1] += 1;
            }
        }
        for j in 0..n {
            counts[j + 1] += counts[j];
        }
        let col_ptr = counts.clone();
        let mut next = counts;

        let nnz = col_ptr[n];
        let mut row_idx = vec![0usize; nnz];
        let mut values = vec![0.0; nnz];
        for j in 0..n {
            let j2 = inv_perm[j];
            for p in self.col_ptr[j]..self.col_ptr[j + 1] {
                let i = self.row_idx[p];
                if i > j {
                    continue;
                }
                let i2 = inv_perm[i];
                let col = i2.max(j2);
                let q = next[col];
                next[col] += 1;
                row_idx[q] = i2.min(j2);
                values[q] = self.values[p];
            }
        }

        Self {
            nrows: n,
            ncols: n,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// First entry `(row, col)` whose mirror is missing or differs.
    ///
    /// Duplicates are summed before comparing, and entries summing to zero
    /// count as absent.
    pub fn find_asymmetry(&self) -> Option<(usize, usize)> {
        if !self.is_square() {
            return Some((0, 0));
        }
        let t = self.transpose();
        let mut mine: Vec<(usize, f64)> = Vec::new();
        let mut theirs: Vec<(usize, f64)> = Vec::new();
        for j in 0..self.ncols {
            let (rows, vals) = self.column(j);
            summed_column(rows, vals, &mut mine);
            let (t_rows, t_vals) = t.column(j);
            summed_column(t_rows, t_vals, &mut theirs);

            let mismatch = mine
                .iter()
                .zip(&theirs)
                .find(|&(&(i, v), &(ti, tv))| i != ti || v != tv)
                .map(|(&(i, _), &(ti, _))| i.min(ti));
            if let Some(i) = mismatch {
                return Some((i, j));
            }
            if mine.len() != theirs.len() {
                let k = mine.len().min(theirs.len());
                let i = mine.get(k).or_else(|| theirs.get(k)).map_or(j, |&(i, _)| i);
                return Some((i, j));
            }
        }
        None
    }
}

/// Sorted `(row, value)` pairs of one column with duplicates summed.
fn summed_column(rows: &[usize], vals: &[f64], out: &mut Vec<(usize, f64)>) {
    out.clear();
    out.extend(rows.iter().copied().zip(vals.iter().copied()));
    out.sort_by_key(|&(i, _)| i);
    let mut len = 0;
    for k in 0..out.len() {
        let (i, v) = out[k];
        if len > 0 && out[len - 1].0 == i {
            out[len - 1].1 += v;
        } else {
            out[len] = (i, v);
            len += 1;
        }
    }
    out.truncate(len);
    out.retain(|&(_, v)| v != 0.0);
}
