//! Benchmark runs and their JSON reports.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spchol_core::linalg::sparse::{self, CscParts};
use spchol_core::{OrderingMethod, SparseCholesky, SymbolicCholesky};

use crate::problems::Problem;

/// One ordering applied to one matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingRun {
    pub ordering: String,
    pub nnz_l: usize,
    /// nnz(L) / nnz(lower triangle of A)
    pub fill_ratio: f64,
    pub tree_height: usize,
    pub analyze_ms: f64,
    pub factor_ms: f64,
    pub solve_ms: f64,
    /// ||A x - b||_inf for b = A * ones
    pub residual: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemReport {
    pub name: String,
    pub n: usize,
    pub nnz_a: usize,
    pub runs: Vec<OrderingRun>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchReport {
    pub problems: Vec<ProblemReport>,
}

impl BenchReport {
    /// Save to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))?;
        Ok(())
    }
}

/// Analyze, factor and solve `problem` with every ordering.
pub fn run_problem(problem: &Problem, orderings: &[OrderingMethod]) -> ProblemReport {
    let a = &problem.matrix;
    let n = a.rows();
    let lower_nnz = a.iter().filter(|&(_, (i, j))| i >= j).count().max(1);

    let runs = orderings
        .iter()
        .map(|&ordering| match run_ordering(problem, ordering) {
            Ok(mut run) => {
                run.fill_ratio = run.nnz_l as f64 / lower_nnz as f64;
                run
            }
            Err(e) => OrderingRun {
                ordering: ordering.to_string(),
                nnz_l: 0,
                fill_ratio: 0.0,
                tree_height: 0,
                analyze_ms: 0.0,
                factor_ms: 0.0,
                solve_ms: 0.0,
                residual: f64::NAN,
                error: Some(e.to_string()),
            },
        })
        .collect();

    ProblemReport {
        name: problem.name.clone(),
        n,
        nnz_a: a.nnz(),
        runs,
    }
}

fn run_ordering(problem: &Problem, ordering: OrderingMethod) -> Result<OrderingRun> {
    let a = &problem.matrix;
    let n = a.rows();

    let start = Instant::now();
    let symbolic = SymbolicCholesky::analyze(&CscParts::from_sprs(a.view()), ordering)?;
    let analyze_ms = start.elapsed().as_secs_f64() * 1000.0;
    let tree_height = symbolic.tree_height();

    let start = Instant::now();
    let chol = SparseCholesky::from_symbolic(a, symbolic)?;
    let factor_ms = start.elapsed().as_secs_f64() * 1000.0;

    let ones = vec![1.0; n];
    let mut b = vec![0.0; n];
    sparse::spmv(a, &ones, &mut b, 1.0, 0.0);

    let mut x = b.clone();
    let start = Instant::now();
    chol.solve(&mut x)?;
    let solve_ms = start.elapsed().as_secs_f64() * 1000.0;

    let mut r = b.clone();
    sparse::spmv(a, &x, &mut r, 1.0, -1.0);
    let residual = r.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

    Ok(OrderingRun {
        ordering: ordering.to_string(),
        nnz_l: chol.nnz_l(),
        fill_ratio: 0.0,
        tree_height,
        analyze_ms,
        factor_ms,
        solve_ms,
        residual,
        error: None,
    })
}

pub fn print_report(report: &ProblemReport) {
    println!("\n{}", "=".repeat(72));
    println!("{}", report.name);
    println!("{}", "=".repeat(72));
    println!("Dimension (n):    {}", report.n);
    println!("A nonzeros:       {}", report.nnz_a);
    println!();
    println!(
        "{:<10} {:>10} {:>8} {:>8} {:>11} {:>11} {:>11} {:>10}",
        "ordering", "nnz(L)", "fill", "height", "analyze ms", "factor ms", "solve ms", "residual"
    );
    for run in &report.runs {
        match &run.error {
            Some(e) => println!("{:<10} ERROR: {}", run.ordering, e),
            None => println!(
                "{:<10} {:>10} {:>8.2} {:>8} {:>11.3} {:>11.3} {:>11.3} {:>10.2e}",
                run.ordering,
                run.nnz_l,
                run.fill_ratio,
                run.tree_height,
                run.analyze_ms,
                run.factor_ms,
                run.solve_ms,
                run.residual
            ),
        }
    }
}
