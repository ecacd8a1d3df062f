//! Benchmarking and inspection CLI for spchol.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use spchol_core::OrderingMethod;

mod problems;
mod report;

use problems::Problem;
use report::{BenchReport, print_report, run_problem};

#[derive(Parser)]
#[command(name = "spchol-bench")]
#[command(version, about = "Sparse Cholesky fill and timing benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Orderings to compare.
    #[arg(short, long, value_enum, default_value = "all", global = true)]
    ordering: OrderingChoice,

    /// Write the report as JSON.
    #[arg(long, global = true)]
    json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 2-D five-point Laplacian on a k x k grid.
    Grid {
        /// Grid side length.
        #[arg(short, long, default_value_t = 64)]
        size: usize,
    },

    /// Random diagonally dominant SPD matrix.
    Random {
        #[arg(short, long, default_value_t = 2000)]
        n: usize,

        /// Probability of each off-diagonal pair.
        #[arg(short, long, default_value_t = 0.002)]
        density: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Matrix Market file.
    Mtx {
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderingChoice {
    Natural,
    Amd,
    All,
}

impl OrderingChoice {
    fn orderings(self) -> Vec<OrderingMethod> {
        match self {
            OrderingChoice::Natural => vec![OrderingMethod::Natural],
            OrderingChoice::Amd => vec![OrderingMethod::Amd],
            OrderingChoice::All => vec![OrderingMethod::Natural, OrderingMethod::Amd],
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let problem: Problem = match cli.command {
        Commands::Grid { size } => problems::grid_laplacian(size),
        Commands::Random { n, density, seed } => problems::random_spd(n, density, seed),
        Commands::Mtx { path } => problems::load_mtx(&path)?,
    };

    println!("spchol Benchmarks");
    println!("=================");

    let result = run_problem(&problem, &cli.ordering.orderings());
    print_report(&result);

    if let Some(path) = cli.json {
        let report = BenchReport {
            problems: vec![result],
        };
        report.save_json(&path)?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
