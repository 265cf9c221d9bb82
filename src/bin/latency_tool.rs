//! Latency dataset utility for overlaysim.
//!
//! Inspects, compacts and caches pairwise latency datasets before they are
//! used by the adaptive simulation.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};

use overlaysim::latency::{save_cache, CacheKey, IndexBase, LatencyMatrix};
use overlaysim::latency::matrix::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(name = "latency-tool")]
#[command(about = "Inspect and preprocess latency datasets for overlaysim")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args)]
struct DatasetArgs {
    /// Path to the latency dataset (`a b cost` per line)
    dataset: PathBuf,

    /// Number of nodes declared by the dataset
    #[arg(short = 'n', long)]
    size: usize,

    /// Identifiers in the dataset start at zero instead of one
    #[arg(long)]
    zero_based: bool,

    /// Costs below this value are treated as infeasible
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
}

impl DatasetArgs {
    fn index_base(&self) -> IndexBase {
        if self.zero_based {
            IndexBase::Zero
        } else {
            IndexBase::One
        }
    }

    fn load(&self) -> Result<LatencyMatrix> {
        LatencyMatrix::load(&self.dataset, self.size, self.index_base(), self.threshold)
            .wrap_err("Failed to load latency dataset")
    }

    fn cache_key(&self) -> Result<CacheKey> {
        CacheKey::for_dataset(&self.dataset, self.size, self.index_base(), self.threshold)
            .wrap_err("Failed to read latency dataset")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print size, feasible links and average ping
    Stats {
        #[command(flatten)]
        input: DatasetArgs,
    },

    /// Drop poorly connected nodes and write a renumbered zero-based dataset
    Compact {
        #[command(flatten)]
        input: DatasetArgs,

        /// Nodes with at most this many feasible peers are removed
        #[arg(long, default_value = "20")]
        min_reachable: usize,

        /// Destination for the compacted dataset
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a compressed binary cache of the parsed matrix, keyed by the
    /// parse options so the simulator only reuses it for the same settings
    Cache {
        #[command(flatten)]
        input: DatasetArgs,

        /// Destination for the cache file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::Stats { input } => print_stats(&input.load()?),
        Commands::Compact {
            input,
            min_reachable,
            output,
        } => {
            let compacted = input.load()?.compact(min_reachable);
            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            compacted
                .write_records(BufWriter::new(file))
                .with_context(|| format!("Failed to write {}", output.display()))?;

            log::info!(
                "Wrote {} nodes to {} (use --zero-based -n {} to load it)",
                compacted.size(),
                output.display(),
                compacted.size()
            );
            print_stats(&compacted);
        }
        Commands::Cache { input, output } => {
            let key = input.cache_key()?;
            save_cache(&key, &input.load()?, &output).wrap_err("Failed to write latency cache")?;
        }
    }

    Ok(())
}

fn print_stats(matrix: &LatencyMatrix) {
    let counts = matrix.reachable_counts();
    let isolated = counts.iter().filter(|&&c| c == 0).count();
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);

    println!("\n=== LATENCY DATASET ===\n");
    println!("Nodes: {}", matrix.size());
    println!("Feasible links: {}", matrix.feasible_pairs());
    println!("Average ping: {:.2}", matrix.average_ping());
    match matrix.average_shortest_distance() {
        Some(best) => println!("Best average distance (full graph): {best:.2}"),
        None => println!("Best average distance (full graph): no connected pairs"),
    }
    println!("Feasible peers per node: min {min}, max {max}");
    println!("Isolated nodes: {isolated}");
    println!();
}
