//! Linear algebra layer.
//!
//! Sparse matrix storage and the compressed-column helpers shared by the
//! ordering, symbolic and numeric phases.

pub mod sparse;
