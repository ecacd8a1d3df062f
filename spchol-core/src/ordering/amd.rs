//! Approximate minimum degree ordering.
//!
//! Works on the quotient graph of `A + A^T` (diagonal dropped). Each
//! uneliminated *variable* keeps the variables it is still directly connected
//! to and the *elements* (eliminated pivots) it belongs to. Eliminating a pivot
//! `p` turns it into a new element whose variable set is
//!
//! ```text
//! Lp = (Ap ∪ ⋃_{e ∈ Ep} Le) \ {p}
//! ```
//!
//! and absorbs every element adjacent to `p`, so the filled elimination graph
//! is never formed. Degrees are the AMD upper bound on the external degree
//!
//! ```text
//! d_i = min(nleft - 1, d_i_old + |Lp \ i|, |Ai| + |Lp \ i| + Σ_{e ∈ Ei \ p} |Le \ Lp|)
//! ```
//!
//! Ties between equal degrees go to the smallest original index, so the same
//! pattern always yields the same permutation.
//!
//! Dense rows, those with more than `max(16, 10 sqrt(n))` off-diagonal entries
//! (capped at `n - 2`), are removed from the graph up front and ordered last in
//! index order. Supervariable detection and mass elimination are not done:
//! indistinguishable variables are eliminated one at a time, which changes
//! running time but not the validity of the ordering.

use std::collections::BTreeSet;

use crate::linalg::sparse::CscParts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Variable,
    Element,
    Absorbed,
    /// Deferred to the end of the ordering.
    Dense,
}

/// Compute an AMD ordering of a square pattern.
///
/// Returns `perm` with `perm[new] = old`.
pub fn order(a: &CscParts) -> Vec<usize> {
    let mut adj = symmetric_adjacency(a);
    let n = adj.len();
    let limit = dense_threshold(n);
    let dense: Vec<usize> = (0..n).filter(|&i| adj[i].len() > limit).collect();
    if !dense.is_empty() {
        log::debug!("amd: deferring {} dense rows (degree > {})", dense.len(), limit);
        let mut is_dense = vec![false; n];
        for &i in &dense {
            is_dense[i] = true;
        }
        for (i, list) in adj.iter_mut().enumerate() {
            if is_dense[i] {
                list.clear();
            } else {
                list.retain(|&v| !is_dense[v]);
            }
        }
    }

    let mut perm = QuotientGraph::new(adj, &dense).eliminate_all();
    perm.extend(dense);
    perm
}

fn dense_threshold(n: usize) -> usize {
    let t = (10.0 * (n as f64).sqrt()) as usize;
    t.max(16).min(n.saturating_sub(2))
}

/// Adjacency lists of `A + A^T` without self loops. Lists are sorted.
pub(crate) fn symmetric_adjacency(a: &CscParts) -> Vec<Vec<usize>> {
    let n = a.ncols();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for j in 0..n {
        for &i in a.column(j).0 {
            if i != j {
                adj[i].push(j);
                adj[j].push(i);
            }
        }
    }
    for list in adj.iter_mut() {
        list.sort_unstable();
        list.dedup();
    }
    adj
}

struct QuotientGraph {
    n: usize,
    /// Variables taking part in elimination (dense rows excluded).
    n_live: usize,
    status: Vec<Node>,
    /// Variables still adjacent to each variable.
    var_adj: Vec<Vec<usize>>,
    /// Elements adjacent to each variable.
    var_elems: Vec<Vec<usize>>,
    /// Variables belonging to each element.
    elem_vars: Vec<Vec<usize>>,
    degree: Vec<usize>,
    queue: BTreeSet<(usize, usize)>,
    mark: Vec<usize>,
    /// |Le \ Lp| scratch, valid when `ext_stamp[e]` equals the current step.
    ext: Vec<usize>,
    ext_stamp: Vec<usize>,
}

impl QuotientGraph {
    fn new(adj: Vec<Vec<usize>>, dense: &[usize]) -> Self {
        let n = adj.len();
        let mut status = vec![Node::Variable; n];
        for &i in dense {
            status[i] = Node::Dense;
        }
        let degree: Vec<usize> = adj.iter().map(Vec::len).collect();
        let queue = (0..n)
            .filter(|&i| status[i] == Node::Variable)
            .map(|i| (degree[i], i))
            .collect();
        Self {
            n,
            n_live: n - dense.len(),
            status,
            var_adj: adj,
            var_elems: vec![Vec::new(); n],
            elem_vars: vec![Vec::new(); n],
            degree,
            queue,
            mark: vec![usize::MAX; n],
            ext: vec![0; n],
            ext_stamp: vec![usize::MAX; n],
        }
    }

    fn eliminate_all(mut self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.n);
        for step in 0..self.n_live {
            let Some((_, pivot)) = self.queue.pop_first() else {
                break;
            };
            self.eliminate(pivot, step);
            order.push(pivot);
        }
        debug_assert_eq!(order.len(), self.n_live);
        order
    }

    fn eliminate(&mut self, p: usize, step: usize) {
        self.status[p] = Node::Element;

        // Lp from the pivot's variables and the variables of its elements
        let mut lp = Vec::new();
        self.mark[p] = step;
        for &i in &self.var_adj[p] {
            if self.status[i] == Node::Variable && self.mark[i] != step {
                self.mark[i] = step;
                lp.push(i);
            }
        }
        let absorbed = std::mem::take(&mut self.var_elems[p]);
        for e in absorbed {
            if self.status[e] != Node::Element {
                continue;
            }
            for &i in &self.elem_vars[e] {
                if self.status[i] == Node::Variable && self.mark[i] != step {
                    self.mark[i] = step;
                    lp.push(i);
                }
            }
            self.status[e] = Node::Absorbed;
            self.elem_vars[e] = Vec::new();
        }
        self.var_adj[p] = Vec::new();
        lp.sort_unstable();

        // |Le \ Lp| for every live element touching Lp
        for &i in &lp {
            let status = &self.status;
            self.var_elems[i].retain(|&e| status[e] == Node::Element);
            for k in 0..self.var_elems[i].len() {
                let e = self.var_elems[i][k];
                if self.ext_stamp[e] != step {
                    self.ext_stamp[e] = step;
                    self.elem_vars[e].retain(|&v| status[v] == Node::Variable);
                    self.ext[e] = self.elem_vars[e].len();
                }
                self.ext[e] -= 1;
            }
        }

        // Elements entirely inside Lp carry no extra information
        for &i in &lp {
            for &e in &self.var_elems[i] {
                if self.ext[e] == 0 {
                    self.status[e] = Node::Absorbed;
                }
            }
        }

        let nleft = self.n_live - step - 1;
        let lp_ext = lp.len().saturating_sub(1);
        for &i in &lp {
            let (status, mark) = (&self.status, &self.mark);
            self.var_adj[i].retain(|&v| status[v] == Node::Variable && mark[v] != step);
            self.var_elems[i].retain(|&e| status[e] == Node::Element);

            let mut bound = self.var_adj[i].len() + lp_ext;
            for &e in &self.var_elems[i] {
                bound += self.ext[e];
            }
            self.var_elems[i].push(p);

            let deg = bound
                .min(self.degree[i] + lp_ext)
                .min(nleft.saturating_sub(1));
            self.queue.remove(&(self.degree[i], i));
            self.degree[i] = deg;
            self.queue.insert((deg, i));
        }

        log::trace!("amd: eliminated {} (|Lp| = {})", p, lp.len());
        self.elem_vars[p] = lp;
    }
}
