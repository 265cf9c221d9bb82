use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, LevelFilter};
use std::path::PathBuf;

use overlaysim::analysis::report::{print_adaptive_summary, print_sweep_summary};
use overlaysim::config_loader::{self, CliOverrides};
use overlaysim::orchestrator;

/// Resilience simulator for randomly built peer-to-peer overlays
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the simulation configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Master seed, overrides the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory for CSV tables and summaries
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Unconstrained parameter sweep over sizes, fan-outs and survival fractions
    Sweep,
    /// Latency-constrained adaptive edge replacement
    Adaptive,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Logging is up before the configuration is read; its level is
    // refined once the configured one is known.
    let env_controlled = init_logging(args.log_level.as_deref());

    let mut config = config_loader::load_config(&args.config)?;
    let overrides = CliOverrides {
        seed: args.seed,
        output_dir: args.output.clone(),
        threads: args.threads,
        log_level: args.log_level.clone(),
    };
    config_loader::apply_overrides(&mut config, &overrides)?;

    if !env_controlled {
        log::set_max_level(log_filter(Some(&config.general.log_level)));
    }

    info!("Configuration file: {:?}", args.config);
    info!("Output directory: {:?}", config.general.output_dir);

    if config.general.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.general.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    match args.command {
        Command::Sweep => {
            let summary = orchestrator::run_sweep(&config)?;
            print_sweep_summary(&summary);
        }
        Command::Adaptive => {
            let summary = orchestrator::run_adaptive(&config)?;
            print_adaptive_summary(&summary);
        }
    }

    info!("Simulation completed successfully");
    Ok(())
}

/// Install env_logger. Without `RUST_LOG` the level is taken from the CLI
/// flag, defaulting to info. Returns whether `RUST_LOG` controls filtering.
fn init_logging(cli_level: Option<&str>) -> bool {
    let env_controlled = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    if !env_controlled {
        log::set_max_level(log_filter(cli_level));
    }
    env_controlled
}

fn log_filter(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}
