//! Symbolic analysis for sparse Cholesky factorization.
//!
//! Depends only on the nonzero pattern:
//! - Fill-reducing ordering (natural or AMD)
//! - Elimination tree construction
//! - Column counts of the factor L
//!
//! The result can be reused for any matrix with the same pattern.

use crate::error::{CholError, CholResult};
use crate::linalg::sparse::CscParts;
use crate::ordering::{OrderingMethod, Permutation};

/// Elimination tree of a symmetric matrix in elimination order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationTree {
    /// Parent of each column, `None` for roots. Always `parent[j] > j`.
    pub parent: Vec<Option<usize>>,

    /// Children of each node, ascending.
    pub children: Vec<Vec<usize>>,

    /// Post-order of the tree; children come before parents.
    pub postorder: Vec<usize>,
}

impl EliminationTree {
    /// Build the elimination tree from the upper triangle of a permuted matrix.
    ///
    /// Scans columns left to right. For each entry `i < k` of column `k`, the
    /// ancestor links are followed from `i` and compressed onto `k`; the node
    /// whose ancestor was still unset becomes a child of `k`.
    pub fn build(c_upper: &CscParts) -> Self {
        let n = c_upper.ncols();
        let mut parent = vec![None; n];
        let mut ancestor: Vec<Option<usize>> = vec![None; n];

        for k in 0..n {
            for &row in c_upper.column(k).0 {
                let mut i = row;
                while i < k {
                    let next = ancestor[i];
                    ancestor[i] = Some(k);
                    match next {
                        Some(a) => i = a,
                        None => {
                            parent[i] = Some(k);
                            break;
                        }
                    }
                }
            }
        }

        Self::from_parent(parent)
    }

    /// Derive children and post-order from a parent array.
    ///
    /// The array must already satisfy `parent[j] > j`.
    fn from_parent(parent: Vec<Option<usize>>) -> Self {
        let n = parent.len();
        let mut children = vec![Vec::new(); n];
        for (j, p) in parent.iter().enumerate() {
            if let Some(p) = *p {
                children[p].push(j);
            }
        }
        let postorder = compute_postorder(&parent, &children);
        Self {
            parent,
            children,
            postorder,
        }
    }

    /// Get root nodes (columns with no parent).
    pub fn roots(&self) -> Vec<usize> {
        self.parent
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(j, _)| j)
            .collect()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        let n = self.parent.len();
        let mut depth = vec![0usize; n];
        for j in (0..n).rev() {
            if let Some(p) = self.parent[j] {
                depth[j] = depth[p] + 1;
            }
        }
        depth.iter().max().map_or(0, |&d| d + 1)
    }
}

/// Symbolic Cholesky analysis: permutation, elimination tree, column counts.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicCholesky {
    n: usize,
    permutation: Permutation,
    etree: EliminationTree,
    column_counts: Vec<usize>,
    col_ptr: Vec<usize>,
}

impl SymbolicCholesky {
    /// Order and analyze a square matrix pattern.
    pub fn analyze(a: &CscParts, ordering: OrderingMethod) -> CholResult<Self> {
        if !a.is_square() {
            return Err(CholError::structural(format!(
                "Matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let permutation = ordering.compute(a)?;
        log::debug!("symbolic: {} ordering for n = {}", ordering, a.ncols());
        Self::analyze_with_permutation(a, permutation)
    }

    /// Analyze a square matrix pattern under a caller-supplied permutation.
    pub fn analyze_with_permutation(a: &CscParts, permutation: Permutation) -> CholResult<Self> {
        let n = a.ncols();
        if !a.is_square() {
            return Err(CholError::structural(format!(
                "Matrix must be square, got {}x{}",
                a.nrows(),
                n
            )));
        }
        if permutation.len() != n {
            return Err(CholError::structural(format!(
                "permutation has size {} but matrix has {} columns",
                permutation.len(),
                n
            )));
        }

        let c_upper = a.symmetric_permute_upper(permutation.inv_perm());
        let etree = EliminationTree::build(&c_upper);
        let column_counts = compute_column_counts(&c_upper.transpose(), &etree)?;
        let col_ptr = cumulative(&column_counts);

        log::debug!(
            "symbolic: nnz(A) = {}, predicted nnz(L) = {}, etree height = {}",
            a.nnz(),
            col_ptr[n],
            etree.height()
        );

        Ok(Self {
            n,
            permutation,
            etree,
            column_counts,
            col_ptr,
        })
    }

    /// Rebuild an analysis from its parts, validating every index.
    ///
    /// `parent[j]` must be `None` or lie in `(j, n)`, every count must be at
    /// least 1 (the diagonal) and at most `n - j`.
    pub fn from_parts(
        permutation: Permutation,
        parent: Vec<Option<usize>>,
        column_counts: Vec<usize>,
    ) -> CholResult<Self> {
        let n = permutation.len();
        if parent.len() != n || column_counts.len() != n {
            return Err(CholError::structural(format!(
                "symbolic parts disagree on size: permutation {}, parent {}, counts {}",
                n,
                parent.len(),
                column_counts.len()
            )));
        }
        for (j, p) in parent.iter().enumerate() {
            if let Some(p) = *p {
                if p <= j || p >= n {
                    return Err(CholError::structural(format!(
                        "invalid elimination tree parent {} for column {}",
                        p, j
                    )));
                }
            }
        }
        for (j, &c) in column_counts.iter().enumerate() {
            if c == 0 || c > n - j {
                return Err(CholError::structural(format!(
                    "invalid column count {} for column {}",
                    c, j
                )));
            }
        }

        let col_ptr = cumulative(&column_counts);
        Ok(Self {
            n,
            permutation,
            etree: EliminationTree::from_parent(parent),
            column_counts,
            col_ptr,
        })
    }

    /// Matrix dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// New-to-old column indices.
    pub fn perm(&self) -> &[usize] {
        self.permutation.perm()
    }

    /// Old-to-new column indices.
    pub fn inv_perm(&self) -> &[usize] {
        self.permutation.inv_perm()
    }

    pub fn etree(&self) -> &EliminationTree {
        &self.etree
    }

    /// Elimination tree parent of each permuted column.
    pub fn parent(&self) -> &[Option<usize>] {
        &self.etree.parent
    }

    /// Post-order of the elimination tree.
    pub fn postorder(&self) -> &[usize] {
        &self.etree.postorder
    }

    /// Predicted nonzeros per column of L, diagonal included.
    pub fn column_counts(&self) -> &[usize] {
        &self.column_counts
    }

    /// Column pointers of L derived from the counts.
    pub fn column_pointers(&self) -> &[usize] {
        &self.col_ptr
    }

    /// Predicted nonzeros of L.
    pub fn nnz_l(&self) -> usize {
        self.col_ptr[self.n]
    }

    pub fn tree_height(&self) -> usize {
        self.etree.height()
    }
}

/// Walks the row subtrees of the elimination tree.
///
/// The reach of row `k` is the set of columns `j < k` with `L[k, j] != 0`.
pub(crate) struct RowReach {
    mark: Vec<usize>,
    out: Vec<usize>,
}

impl RowReach {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            mark: vec![usize::MAX; n],
            out: Vec::with_capacity(n),
        }
    }

    /// Reach of row `k` given the upper triangle of the permuted matrix.
    ///
    /// Fails when a path climbs past `k`, meaning the pattern does not belong
    /// to this elimination tree.
    pub(crate) fn reach(
        &mut self,
        c_upper: &CscParts,
        k: usize,
        parent: &[Option<usize>],
    ) -> CholResult<&[usize]> {
        self.out.clear();
        self.mark[k] = k;
        for &row in c_upper.column(k).0 {
            let mut i = row;
            while self.mark[i] != k {
                if i > k {
                    return Err(CholError::structural(format!(
                        "row {} reaches column {} outside the elimination tree",
                        k, i
                    )));
                }
                self.out.push(i);
                self.mark[i] = k;
                match parent[i] {
                    Some(p) => i = p,
                    None => {
                        return Err(CholError::structural(format!(
                            "row {} reaches root {} before its own column",
                            k, i
                        )))
                    }
                }
            }
        }
        Ok(&self.out)
    }
}

/// Post-order by iterative depth-first search from each root.
fn compute_postorder(parent: &[Option<usize>], children: &[Vec<usize>]) -> Vec<usize> {
    let n = parent.len();
    let mut postorder = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in (0..n).filter(|&j| parent[j].is_none()) {
        stack.push((root, 0));
        while let Some(top) = stack.last_mut() {
            let (node, next_child) = *top;
            if let Some(&child) = children[node].get(next_child) {
                top.1 += 1;
                stack.push((child, 0));
            } else {
                postorder.push(node);
                stack.pop();
            }
        }
    }

    postorder
}

/// Column counts of L with the row-subtree skeleton technique.
///
/// Visits columns in post-order. For each entry `i > j` of the lower triangle
/// the least-common-ancestor test (`first`, `max_first`, `prev_leaf`) decides
/// whether `j` is a leaf of row `i`'s subtree; the per-node deltas summed up the
/// tree give the counts. Near-linear in nnz(A).
fn compute_column_counts(c_lower: &CscParts, etree: &EliminationTree) -> CholResult<Vec<usize>> {
    let n = c_lower.ncols();
    let parent = &etree.parent;
    let post = &etree.postorder;
    if post.len() != n {
        return Err(CholError::structural("elimination tree post-order is incomplete"));
    }

    let mut first = vec![usize::MAX; n];
    let mut delta = vec![0isize; n];
    for (k, &j) in post.iter().enumerate() {
        delta[j] = if first[j] == usize::MAX { 1 } else { 0 };
        let mut node = Some(j);
        while let Some(x) = node {
            if first[x] != usize::MAX {
                break;
            }
            first[x] = k;
            node = parent[x];
        }
    }

    let mut ancestor: Vec<usize> = (0..n).collect();
    let mut max_first: Vec<Option<usize>> = vec![None; n];
    let mut prev_leaf: Vec<Option<usize>> = vec![None; n];

    for &j in post {
        if let Some(p) = parent[j] {
            delta[p] -= 1;
        }
        for &i in c_lower.column(j).0 {
            if i <= j || max_first[i].map_or(false, |m| first[j] <= m) {
                continue;
            }
            // j is a leaf of the i-th row subtree
            max_first[i] = Some(first[j]);
            delta[j] += 1;
            if let Some(jprev) = prev_leaf[i].replace(j) {
                let mut q = jprev;
                while q != ancestor[q] {
                    q = ancestor[q];
                }
                let mut s = jprev;
                while s != q {
                    let next = ancestor[s];
                    ancestor[s] = q;
                    s = next;
                }
                delta[q] -= 1;
            }
        }
        if let Some(p) = parent[j] {
            ancestor[j] = p;
        }
    }

    for j in 0..n {
        if let Some(p) = parent[j] {
            delta[p] += delta[j];
        }
    }

    delta
        .into_iter()
        .enumerate()
        .map(|(j, d)| {
            usize::try_from(d)
                .ok()
                .filter(|&c| c >= 1 && c <= n - j)
                .ok_or_else(|| {
                    CholError::structural(format!("inconsistent column count {} for column {}", d, j))
                })
        })
        .collect()
}

fn cumulative(counts: &[usize]) -> Vec<usize> {
    let mut col_ptr = Vec::with_capacity(counts.len() + 1);
    col_ptr.push(0);
    let mut total = 0;
    for &c in counts {
        total += c;
        col_ptr.push(total);
    }
    col_ptr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    fn tridiagonal(n: usize) -> CscParts {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 4.0));
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        CscParts::from_sprs(sparse::symmetric_from_upper(n, triplets).view())
    }

    /// Column counts by explicit dense symbolic elimination.
    fn brute_force_counts(a: &CscParts, perm: &Permutation) -> Vec<usize> {
        let n = a.ncols();
        let c = a.symmetric_permute_upper(perm.inv_perm());
        let mut pattern = vec![vec![false; n]; n];
        for j in 0..n {
            for &i in c.column(j).0 {
                pattern[j][i] = true; // lower: row j, col i
            }
            pattern[j][j] = true;
        }
        for k in 0..n {
            let rows: Vec<usize> = (k + 1..n).filter(|&i| pattern[i][k]).collect();
            for &i in &rows {
                for &r in &rows {
                    if r >= i {
                        pattern[r][i] = true;
                    }
                }
            }
        }
        (0..n).map(|j| (j..n).filter(|&i| pattern[i][j]).count()).collect()
    }

    #[test]
    fn test_etree_simple() {
        // Tridiagonal: parent[j] = j + 1
        let a = tridiagonal(4);
        let symbolic = SymbolicCholesky::analyze(&a, OrderingMethod::Natural).unwrap();

        assert_eq!(symbolic.parent(), &[Some(1), Some(2), Some(3), None]);
        assert_eq!(symbolic.column_counts(), &[2, 2, 2, 1]);
        assert_eq!(symbolic.nnz_l(), 7);
        assert_eq!(symbolic.etree().roots(), vec![3]);
        assert_eq!(symbolic.tree_height(), 4);
        assert_eq!(symbolic.postorder(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_diagonal_forest() {
        let a = CscParts::from_sprs(sparse::diagonal(&[1.0, 2.0, 3.0]).view());
        let symbolic = SymbolicCholesky::analyze(&a, OrderingMethod::Amd).unwrap();
        assert_eq!(symbolic.parent(), &[None, None, None]);
        assert_eq!(symbolic.column_counts(), &[1, 1, 1]);
        assert_eq!(symbolic.tree_height(), 1);
    }

    #[test]
    fn test_fill_in_counted() {
        // Arrow with the hub first: natural order fills L completely
        let n = 5;
        let mut triplets = vec![(0, 0, 10.0)];
        for i in 1..n {
            triplets.push((0, i, 1.0));
            triplets.push((i, i, 3.0));
        }
        let a = CscParts::from_sprs(sparse::symmetric_from_upper(n, triplets).view());

        let natural = SymbolicCholesky::analyze(&a, OrderingMethod::Natural).unwrap();
        assert_eq!(natural.column_counts(), &[5, 4, 3, 2, 1]);
        assert_eq!(natural.nnz_l(), 15);

        let amd = SymbolicCholesky::analyze(&a, OrderingMethod::Amd).unwrap();
        assert_eq!(amd.nnz_l(), 2 * n - 1);
    }

    #[test]
    fn test_counts_match_brute_force() {
        // 2-D grid Laplacian, both orderings
        let k = 5;
        let n = k * k;
        let mut triplets = Vec::new();
        for r in 0..k {
            for c in 0..k {
                let i = r * k + c;
                triplets.push((i, i, 4.0));
                if c + 1 < k {
                    triplets.push((i, i + 1, -1.0));
                }
                if r + 1 < k {
                    triplets.push((i, i + k, -1.0));
                }
            }
        }
        let a = CscParts::from_sprs(sparse::symmetric_from_upper(n, triplets).view());

        for ordering in [OrderingMethod::Natural, OrderingMethod::Amd] {
            let symbolic = SymbolicCholesky::analyze(&a, ordering).unwrap();
            let expected = brute_force_counts(&a, symbolic.permutation());
            assert_eq!(symbolic.column_counts(), expected.as_slice(), "{}", ordering);
        }
    }

    #[test]
    fn test_rejects_rectangular() {
        let a = CscParts::from_sprs(sparse::from_triplets(2, 3, vec![(0, 0, 1.0)]).view());
        let err = SymbolicCholesky::analyze_with_permutation(&a, Permutation::identity(3)).unwrap_err();
        assert!(matches!(err, CholError::Structural(_)));
    }

    #[test]
    fn test_rejects_wrong_permutation_size() {
        let a = tridiagonal(3);
        let err = SymbolicCholesky::analyze_with_permutation(&a, Permutation::identity(4)).unwrap_err();
        assert!(matches!(err, CholError::Structural(_)));
    }

    #[test]
    fn test_from_parts_validation() {
        let p = Permutation::identity(3);
        assert!(SymbolicCholesky::from_parts(p.clone(), vec![Some(1), Some(2), None], vec![2, 2, 1]).is_ok());
        // parent must point forward
        assert!(SymbolicCholesky::from_parts(p.clone(), vec![Some(0), None, None], vec![1, 1, 1]).is_err());
        // parent out of range
        assert!(SymbolicCholesky::from_parts(p.clone(), vec![Some(3), None, None], vec![1, 1, 1]).is_err());
        // count exceeds remaining rows
        assert!(SymbolicCholesky::from_parts(p.clone(), vec![None, None, None], vec![1, 1, 2]).is_err());
        // size disagreement
        assert!(SymbolicCholesky::from_parts(p, vec![None, None], vec![1, 1, 1]).is_err());
    }

    #[test]
    fn test_round_trip_through_parts() {
        let a = tridiagonal(6);
        let symbolic = SymbolicCholesky::analyze(&a, OrderingMethod::Amd).unwrap();
        let rebuilt = SymbolicCholesky::from_parts(
            symbolic.permutation().clone(),
            symbolic.parent().to_vec(),
            symbolic.column_counts().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, symbolic);
    }

    #[test]
    fn test_row_reach() {
        let a = tridiagonal(4);
        let symbolic = SymbolicCholesky::analyze(&a, OrderingMethod::Natural).unwrap();
        let c = a.symmetric_permute_upper(symbolic.inv_perm());
        let mut reach = RowReach::new(4);
        assert_eq!(reach.reach(&c, 0, symbolic.parent()).unwrap(), &[] as &[usize]);
        assert_eq!(reach.reach(&c, 2, symbolic.parent()).unwrap(), &[1]);
    }
}
