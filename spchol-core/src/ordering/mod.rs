//! Fill-reducing orderings.
//!
//! An ordering maps the columns of a symmetric matrix to the order in which
//! they are eliminated. Two methods are available:
//!
//! - **Natural** (mode 0): the identity permutation.
//! - **AMD** (mode 1): approximate minimum degree on the pattern of `A + A^T`,
//!   see [`amd`].

pub mod amd;

use std::fmt;
use std::str::FromStr;

use crate::error::{CholError, CholResult};
use crate::linalg::sparse::CscParts;

/// Fill-reducing ordering method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum OrderingMethod {
    /// No reordering (identity permutation).
    Natural,
    /// Approximate Minimum Degree on `A + A^T`.
    #[default]
    Amd,
}

impl OrderingMethod {
    /// Integer mode: 0 for natural, 1 for AMD.
    pub fn mode(self) -> i32 {
        match self {
            OrderingMethod::Natural => 0,
            OrderingMethod::Amd => 1,
        }
    }

    /// Compute the permutation for a square matrix pattern.
    pub fn compute(self, a: &CscParts) -> CholResult<Permutation> {
        if !a.is_square() {
            return Err(CholError::invalid(format!(
                "Matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        match self {
            OrderingMethod::Natural => Ok(Permutation::identity(a.ncols())),
            OrderingMethod::Amd => Permutation::from_perm(amd::order(a)),
        }
    }
}

impl TryFrom<i32> for OrderingMethod {
    type Error = CholError;

    fn try_from(mode: i32) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(OrderingMethod::Natural),
            1 => Ok(OrderingMethod::Amd),
            _ => Err(CholError::invalid(format!(
                "ordering must be 0 (natural) or 1 (amd), got {}",
                mode
            ))),
        }
    }
}

impl FromStr for OrderingMethod {
    type Err = CholError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "natural" => Ok(OrderingMethod::Natural),
            "1" | "amd" => Ok(OrderingMethod::Amd),
            other => Err(CholError::invalid(format!("unknown ordering '{}'", other))),
        }
    }
}

impl fmt::Display for OrderingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingMethod::Natural => write!(f, "natural"),
            OrderingMethod::Amd => write!(f, "amd"),
        }
    }
}

/// A permutation stored in both directions.
///
/// `perm[new] = old` and `inv_perm[old] = new`; both are bijections on `[0, n)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    perm: Vec<usize>,
    inv_perm: Vec<usize>,
}

impl Permutation {
    /// Identity permutation of size `n`.
    pub fn identity(n: usize) -> Self {
        let perm: Vec<usize> = (0..n).collect();
        let inv_perm = perm.clone();
        Self { perm, inv_perm }
    }

    /// Build from the new-to-old array, validating that it is a bijection.
    pub fn from_perm(perm: Vec<usize>) -> CholResult<Self> {
        let n = perm.len();
        let mut inv_perm = vec![usize::MAX; n];
        for (new, &old) in perm.iter().enumerate() {
            if old >= n {
                return Err(CholError::structural(format!(
                    "permutation entry {} out of range for size {}",
                    old, n
                )));
            }
            if inv_perm[old] != usize::MAX {
                return Err(CholError::structural(format!(
                    "permutation repeats index {}",
                    old
                )));
            }
            inv_perm[old] = new;
        }
        Ok(Self { perm, inv_perm })
    }

    /// Build from both arrays, checking `inv_perm[perm[i]] == i`.
    pub fn from_parts(perm: Vec<usize>, inv_perm: Vec<usize>) -> CholResult<Self> {
        let p = Self::from_perm(perm)?;
        if p.inv_perm != inv_perm {
            return Err(CholError::structural(
                "inverse permutation does not match permutation",
            ));
        }
        Ok(p)
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    /// New-to-old indices.
    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Old-to-new indices.
    pub fn inv_perm(&self) -> &[usize] {
        &self.inv_perm
    }

    pub fn is_identity(&self) -> bool {
        self.perm.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// The inverse permutation.
    pub fn inverse(&self) -> Self {
        Self {
            perm: self.inv_perm.clone(),
            inv_perm: self.perm.clone(),
        }
    }

    /// Move `src` into elimination order: `dst[inv_perm[k]] = src[k]`.
    pub fn gather(&self, src: &[f64], dst: &mut [f64]) {
        debug_assert_eq!(src.len(), self.len());
        debug_assert_eq!(dst.len(), self.len());
        for (k, &v) in src.iter().enumerate() {
            dst[self.inv_perm[k]] = v;
        }
    }

    /// Move `src` back to the caller's order: `dst[k] = src[inv_perm[k]]`.
    pub fn scatter(&self, src: &[f64], dst: &mut [f64]) {
        debug_assert_eq!(src.len(), self.len());
        debug_assert_eq!(dst.len(), self.len());
        for (k, d) in dst.iter_mut().enumerate() {
            *d = src[self.inv_perm[k]];
        }
    }
}
