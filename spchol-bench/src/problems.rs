//! Test matrix generators and loaders.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spchol_core::linalg::sparse::{self, SparseCsc};

/// A named SPD matrix to benchmark.
pub struct Problem {
    pub name: String,
    pub matrix: SparseCsc,
}

/// Five-point Laplacian on a k x k grid.
pub fn grid_laplacian(k: usize) -> Problem {
    let n = k * k;
    let mut triplets = Vec::with_capacity(3 * n);
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
    Problem {
        name: format!("grid{}x{}", k, k),
        matrix: sparse::symmetric_from_upper(n, triplets),
    }
}

/// Random sparse SPD matrix made positive definite by diagonal dominance.
///
/// Each off-diagonal pair is present with probability `density`.
pub fn random_spd(n: usize, density: f64, seed: u64) -> Problem {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triplets = Vec::new();
    let mut row_sums = vec![0.0; n];

    for j in 0..n {
        for i in 0..j {
            if rng.gen::<f64>() < density {
                let v: f64 = rng.gen_range(-1.0..1.0);
                triplets.push((i, j, v));
                row_sums[i] += v.abs();
                row_sums[j] += v.abs();
            }
        }
    }
    for (i, s) in row_sums.into_iter().enumerate() {
        triplets.push((i, i, s + 1.0));
    }

    Problem {
        name: format!("random_n{}_d{}_s{}", n, density, seed),
        matrix: sparse::symmetric_from_upper(n, triplets),
    }
}

/// Load a Matrix Market file.
pub fn load_mtx(path: &Path) -> Result<Problem> {
    let tri = sprs::io::read_matrix_market::<f64, usize, _>(path)
        .with_context(|| format!("Failed to read Matrix Market file {}", path.display()))?;
    if tri.rows() != tri.cols() {
        bail!(
            "{} is {}x{}, expected a square matrix",
            path.display(),
            tri.rows(),
            tri.cols()
        );
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Problem {
        name,
        matrix: tri.to_csc(),
    })
}
