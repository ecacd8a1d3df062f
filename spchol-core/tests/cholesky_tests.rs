//! End-to-end factorization and solve tests.
//!
//! Random SPD matrices are built diagonally dominant so that every test
//! matrix is positive definite regardless of the sampled pattern.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spchol_core::linalg::sparse::{self, SparseCsc};
use spchol_core::{OrderingMethod, SolveMode, SparseCholesky, SymbolicCholesky};

const TOL: f64 = 1e-10;

/// Random sparse SPD matrix storing both triangles.
fn random_spd(n: usize, density: f64, rng: &mut ChaCha8Rng) -> SparseCsc {
    let mut upper = Vec::new();
    let mut row_sums = vec![0.0; n];
    for j in 0..n {
        for i in 0..j {
            if rng.gen::<f64>() < density {
                let v: f64 = rng.gen_range(-1.0..1.0);
                upper.push((i, j, v));
                row_sums[i] += v.abs();
                row_sums[j] += v.abs();
            }
        }
    }
    for (i, s) in row_sums.iter().enumerate() {
        upper.push((i, i, s + 1.0 + rng.gen::<f64>()));
    }
    sparse::symmetric_from_upper(n, upper)
}

fn grid_laplacian(k: usize) -> SparseCsc {
    let n = k * k;
    let mut upper = Vec::new();
    for r in 0..k {
        for c in 0..k {
            let i = r * k + c;
            upper.push((i, i, 4.0));
            if c + 1 < k {
                upper.push((i, i + 1, -1.0));
            }
            if r + 1 < k {
                upper.push((i, i + k, -1.0));
            }
        }
    }
    sparse::symmetric_from_upper(n, upper)
}

fn to_dense(a: &SparseCsc) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.rows(), a.cols());
    for (&v, (i, j)) in a.iter() {
        dense[(i, j)] += v;
    }
    dense
}

fn residual_inf(a: &SparseCsc, x: &[f64], b: &[f64]) -> f64 {
    let mut ax = vec![0.0; b.len()];
    sparse::spmv(a, x, &mut ax, 1.0, 0.0);
    ax.iter()
        .zip(b)
        .map(|(l, r)| (l - r).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_two_by_two_scenario() {
    // [[4, 2], [2, 3]] -> L = [[2, 0], [1, sqrt(2)]], A^{-1} [1, 1] = [1/8, 1/4]
    let a = sparse::symmetric_from_upper(2, vec![(0, 0, 4.0), (0, 1, 2.0), (1, 1, 3.0)]);
    let chol = SparseCholesky::with_mode(&a, 0).unwrap();

    let l = to_dense(&chol.l().unwrap());
    let expected = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 1.0, 2.0_f64.sqrt()]);
    assert!((l - expected).abs().max() < 1e-14);

    let mut x = vec![1.0, 1.0];
    chol.solve(&mut x).unwrap();
    assert!((x[0] - 0.125).abs() < 1e-14);
    assert!((x[1] - 0.25).abs() < 1e-14);
    assert!(residual_inf(&a, &x, &[1.0, 1.0]) < 1e-14);
}

#[test]
fn test_reconstruction_random() {
    let mut rng = ChaCha8Rng::seed_from_u64(20241);
    for &(n, density) in &[(1, 1.0), (5, 0.5), (20, 0.2), (60, 0.05)] {
        let a = random_spd(n, density, &mut rng);
        let dense = to_dense(&a);
        for ordering in [OrderingMethod::Natural, OrderingMethod::Amd] {
            let chol = SparseCholesky::new(&a, ordering).unwrap();
            let l = to_dense(&chol.l().unwrap());
            let llt = &l * l.transpose();

            // (L L^T)[i, j] = A[perm[i], perm[j]]
            let perm = chol.permutation().perm();
            for i in 0..n {
                for j in 0..n {
                    let diff = (llt[(i, j)] - dense[(perm[i], perm[j])]).abs();
                    assert!(diff < TOL, "n = {}, {}: ({}, {}) off by {}", n, ordering, i, j, diff);
                }
            }
        }
    }
}

#[test]
fn test_factor_is_lower_with_positive_diagonal() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let a = random_spd(40, 0.1, &mut rng);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let l = chol.l().unwrap();
    assert_eq!(l.nnz(), chol.nnz_l());
    for (&v, (i, j)) in l.iter() {
        assert!(i >= j);
        if i == j {
            assert!(v > 0.0 && v.is_finite());
        }
    }
}

#[test]
fn test_solve_random() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for &n in &[3, 17, 50] {
        let a = random_spd(n, 0.15, &mut rng);
        let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-5.0..5.0)).collect();
        for ordering in [OrderingMethod::Natural, OrderingMethod::Amd] {
            let chol = SparseCholesky::new(&a, ordering).unwrap();
            let x = chol.solve_vec(&b).unwrap();
            assert!(residual_inf(&a, &x, &b) < 1e-9, "n = {}, {}", n, ordering);
        }
    }
}

#[test]
fn test_ordering_invariance() {
    let mut rng = ChaCha8Rng::seed_from_u64(4242);
    let a = random_spd(35, 0.1, &mut rng);
    let b: Vec<f64> = (0..35).map(|i| (i as f64).sin()).collect();

    let natural = SparseCholesky::new(&a, OrderingMethod::Natural).unwrap();
    let amd = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let x0 = natural.solve_vec(&b).unwrap();
    let x1 = amd.solve_vec(&b).unwrap();
    for (u, v) in x0.iter().zip(&x1) {
        assert!((u - v).abs() < TOL);
    }
}

#[test]
fn test_permutation_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let a = random_spd(25, 0.2, &mut rng);
    for ordering in [OrderingMethod::Natural, OrderingMethod::Amd] {
        let chol = SparseCholesky::new(&a, ordering).unwrap();
        let p = chol.permutation();
        for i in 0..25 {
            assert_eq!(p.inv_perm()[p.perm()[i]], i);
            assert_eq!(p.perm()[p.inv_perm()[i]], i);
        }
    }
}

#[test]
fn test_amd_reduces_fill_on_arrow() {
    // Hub in column 0: natural order fills L completely
    let n = 30;
    let mut upper = vec![(0, 0, n as f64 * 2.0)];
    for i in 1..n {
        upper.push((0, i, 1.0));
        upper.push((i, i, 2.0));
    }
    let a = sparse::symmetric_from_upper(n, upper);

    let natural = SparseCholesky::new(&a, OrderingMethod::Natural).unwrap();
    let amd = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    assert_eq!(natural.nnz_l(), n * (n + 1) / 2);
    assert_eq!(amd.nnz_l(), 2 * n - 1);
}

#[test]
fn test_amd_reduces_fill_on_grid() {
    let a = grid_laplacian(16);
    let natural = SparseCholesky::new(&a, OrderingMethod::Natural).unwrap();
    let amd = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    assert!(
        amd.nnz_l() < natural.nnz_l(),
        "amd {} vs natural {}",
        amd.nnz_l(),
        natural.nnz_l()
    );

    let b = vec![1.0; 256];
    let x = amd.solve_vec(&b).unwrap();
    assert!(residual_inf(&a, &x, &b) < 1e-10);
}

#[test]
fn test_mode_decomposition_law() {
    let mut rng = ChaCha8Rng::seed_from_u64(31337);
    let a = random_spd(30, 0.15, &mut rng);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let b: Vec<f64> = (0..30).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut full = b.clone();
    chol.solve_with_mode(&mut full, SolveMode::Full).unwrap();

    let mut split = b.clone();
    chol.solve_with_mode(&mut split, SolveMode::LowerOnly).unwrap();
    chol.solve_with_mode(&mut split, SolveMode::UpperOnly).unwrap();

    for (u, v) in full.iter().zip(&split) {
        assert!((u - v).abs() < 1e-12);
    }
}

#[test]
fn test_lower_only_matches_dense_forward_substitution() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let a = random_spd(12, 0.3, &mut rng);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let l = to_dense(&chol.l().unwrap());
    let perm = chol.permutation().perm().to_vec();

    let b: Vec<f64> = (0..12).map(|i| i as f64 - 4.0).collect();
    let mut x = b.clone();
    chol.solve_with_mode(&mut x, SolveMode::LowerOnly).unwrap();

    // x = P^T L^{-1} P b
    let pb = DVector::from_iterator(12, perm.iter().map(|&old| b[old]));
    let y = l.solve_lower_triangular(&pb).unwrap();
    for (new, &old) in perm.iter().enumerate() {
        assert!((x[old] - y[new]).abs() < 1e-12);
    }
}

#[test]
fn test_log_determinant() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let a = random_spd(15, 0.3, &mut rng);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();

    let dense_l = to_dense(&a).cholesky().unwrap().l();
    let expected: f64 = 2.0 * dense_l.diagonal().iter().map(|d| d.ln()).sum::<f64>();
    assert!((chol.log_determinant().unwrap() - expected).abs() < 1e-10);
}

#[test]
fn test_solve_many() {
    let a = grid_laplacian(4);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let mut b = DMatrix::from_fn(16, 3, |i, j| (i + 2 * j) as f64);
    let original = b.clone();
    chol.solve_many(&mut b).unwrap();

    for j in 0..3 {
        let rhs: Vec<f64> = original.column(j).iter().copied().collect();
        let x = chol.solve_vec(&rhs).unwrap();
        for i in 0..16 {
            assert!((b[(i, j)] - x[i]).abs() < 1e-14);
        }
    }
}

#[test]
fn test_symbolic_reuse() {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let a = random_spd(20, 0.2, &mut rng);
    let chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    let symbolic: SymbolicCholesky = chol.symbolic();

    // Same pattern, scaled values
    let mut scaled = a.clone();
    for v in scaled.data_mut() {
        *v *= 3.0;
    }
    let reused = SparseCholesky::from_symbolic(&scaled, symbolic.clone()).unwrap();
    assert_eq!(reused.symbolic(), symbolic);
    assert_eq!(reused.nnz_l(), chol.nnz_l());

    let b = vec![1.0; 20];
    let x = chol.solve_vec(&b).unwrap();
    let y = reused.solve_vec(&b).unwrap();
    for (u, v) in x.iter().zip(&y) {
        assert!((u - 3.0 * v).abs() < 1e-10);
    }
}

#[test]
fn test_refactor_matches_fresh_factor() {
    let a = grid_laplacian(5);
    // Same pattern: the diagonal is already stored
    let shifted = &a + &sparse::identity(25);

    let mut chol = SparseCholesky::new(&a, OrderingMethod::Amd).unwrap();
    chol.refactor(&shifted).unwrap();
    let fresh = SparseCholesky::new(&shifted, OrderingMethod::Amd).unwrap();

    let b = vec![2.0; 25];
    let x = chol.solve_vec(&b).unwrap();
    let y = fresh.solve_vec(&b).unwrap();
    for (u, v) in x.iter().zip(&y) {
        assert!((u - v).abs() < 1e-14);
    }
}

#[test]
fn test_csr_input_keeps_orientation() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let csc = random_spd(10, 0.3, &mut rng);
    let csr = csc.to_other_storage();
    assert!(csr.is_csr());

    let from_csc = SparseCholesky::new(&csc, OrderingMethod::Amd).unwrap();
    let from_csr = SparseCholesky::new(&csr, OrderingMethod::Amd).unwrap();

    let l = from_csr.l().unwrap();
    let lt = from_csr.l_transpose().unwrap();
    assert!(l.is_csr());
    assert!(lt.is_csr());
    assert_eq!(to_dense(&l), to_dense(&from_csc.l().unwrap()));
    assert_eq!(to_dense(&lt), to_dense(&l).transpose());
}

#[test]
fn test_l_transpose_matches_l() {
    let a = grid_laplacian(3);
    let chol = SparseCholesky::new(&a, OrderingMethod::Natural).unwrap();
    let l = chol.l().unwrap();
    let lt = chol.l_transpose().unwrap();
    assert!(lt.is_csc());
    assert_eq!(to_dense(&lt), to_dense(&l).transpose());
}
