//! Simulation orchestrator.
//!
//! Drives the two batch modes. Every (parameters, run) pair becomes an
//! independent task that owns its graph and its own `StdRng`. Seeds are drawn
//! from the master generator in task order before anything runs, so results
//! depend only on the master seed and the configuration, never on scheduling.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{eyre, Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::analysis::report::{
    generate_json_report, generate_text_report, write_sweep_csv, RoundRow, RoundWriter,
};
use crate::analysis::{
    distances_from, run_round, unavailability, AdaptiveSummary, AdaptiveTrialSummary,
    ReportMetadata, ResultsAccumulator, RunMode, SweepEntry, SweepParams, SweepSummary,
};
use crate::config::{AdaptiveConfig, LatencyConfig, SimulationConfig, SweepConfig};
use crate::latency::{load_matching_cache, save_cache, CacheKey, LatencyMatrix};
use crate::topology::{kill_nodes, reboot, BuildError, RandomBuilder, Saturator};

/// Configured master seed, or one derived from the clock.
pub fn master_seed(config: &SimulationConfig) -> u64 {
    config.general.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    })
}

/// One seed per task, drawn in task order.
pub fn draw_seeds(master: u64, count: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(master);
    (0..count).map(|_| rng.gen()).collect()
}

fn metadata(mode: RunMode, master_seed: u64, tasks: usize) -> ReportMetadata {
    ReportMetadata {
        mode,
        generated_at: chrono::Utc::now().to_rfc3339(),
        master_seed,
        threads: rayon::current_num_threads(),
        tasks,
    }
}

fn create_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

#[derive(Debug, Clone, Copy)]
struct SweepTask {
    set: usize,
    params: SweepParams,
    seed: u64,
}

/// Run the unconstrained parameter sweep and write `sweep.csv`,
/// `sweep_summary.json` and `sweep_summary.txt` to the output directory.
pub fn run_sweep(config: &SimulationConfig) -> Result<SweepSummary> {
    let sweep = config
        .sweep
        .as_ref()
        .ok_or_else(|| eyre!("Configuration has no sweep section"))?;
    let output_dir = &config.general.output_dir;
    create_output_dir(output_dir)?;

    let master = master_seed(config);
    let sets = sweep.parameter_sets();
    let seeds = draw_seeds(master, sets.len() * sweep.runs);
    let tasks: Vec<SweepTask> = sets
        .iter()
        .enumerate()
        .flat_map(|(set, &params)| (0..sweep.runs).map(move |_| (set, params)))
        .zip(seeds)
        .map(|((set, params), seed)| SweepTask { set, params, seed })
        .collect();

    info!(
        "Running sweep: {} parameter sets x {} runs (master seed {})",
        sets.len(),
        sweep.runs,
        master
    );

    let finished = AtomicUsize::new(0);
    let total = tasks.len();
    let outcomes: Vec<(usize, ResultsAccumulator)> = tasks
        .par_iter()
        .map(|task| -> Result<(usize, ResultsAccumulator), BuildError> {
            let acc = run_sweep_task(config, sweep, task)?;
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            info!("{}/{} trials finished", done, total);
            Ok((task.set, acc))
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let mut per_set: Vec<ResultsAccumulator> = sets
        .iter()
        .map(|p| ResultsAccumulator::new(p.max_degree, sweep.max_distance))
        .collect();
    for (set, acc) in &outcomes {
        per_set[*set].merge(acc);
    }

    let entries: Vec<SweepEntry> = sets
        .iter()
        .zip(per_set)
        .map(|(&params, acc)| SweepEntry {
            params,
            runs: sweep.runs,
            results: acc.finalize(),
        })
        .collect();

    let summary = SweepSummary {
        metadata: metadata(RunMode::Sweep, master, total),
        entries,
    };

    write_sweep_csv(&summary.entries, &output_dir.join("sweep.csv"))?;
    generate_json_report(&summary, &output_dir.join("sweep_summary.json"))?;
    generate_text_report(&summary, &output_dir.join("sweep_summary.txt"))?;

    Ok(summary)
}

fn run_sweep_task(
    config: &SimulationConfig,
    sweep: &SweepConfig,
    task: &SweepTask,
) -> Result<ResultsAccumulator, BuildError> {
    let params = &task.params;
    let mut rng = StdRng::seed_from_u64(task.seed);

    let builder = RandomBuilder::new(params.k, params.max_degree)?
        .with_degree_margin(config.construction.degree_margin)
        .with_max_attempts(config.construction.build_attempts)?;
    let outcome = builder.build(params.size, &mut rng)?;
    let mut graph = outcome.graph;
    if params.alive < 1.0 {
        kill_nodes(&mut graph, params.alive);
    }

    let mut acc = ResultsAccumulator::new(params.max_degree, sweep.max_distance);
    acc.record_under_provisioned(outcome.under_provisioned.len());
    acc.update_degrees(&graph);

    for source in graph.nodes().take(sweep.distance_sources) {
        acc.update_distances(&distances_from(&graph, source), source);
    }

    if sweep.min_cut {
        let estimate = config.min_cut.estimator().estimate(&graph, &mut rng);
        if estimate.budget_exhausted {
            debug!("Min-cut budget exhausted for n={} k={}", params.size, params.k);
        }
        acc.record_min_cut(estimate.value);
    }

    Ok(acc)
}

/// Load the latency dataset, through the cache when one is configured, and
/// apply compaction. A cache built from other parse parameters or another
/// version of the dataset is replaced.
pub fn load_latency(config: &LatencyConfig) -> Result<LatencyMatrix> {
    let Some(cache) = &config.cache else {
        return Ok(compact(config, parse_latency(config)?));
    };

    let key = CacheKey::for_dataset(&config.path, config.size, config.index_base, config.threshold)
        .wrap_err("Failed to load latency dataset")?;
    let cached = if cache.exists() {
        info!("Using latency cache {}", cache.display());
        load_matching_cache(cache, &key).wrap_err("Failed to load latency cache")?
    } else {
        None
    };

    let matrix = match cached {
        Some(matrix) => matrix,
        None => {
            let matrix = parse_latency(config)?;
            save_cache(&key, &matrix, cache).wrap_err("Failed to write latency cache")?;
            matrix
        }
    };
    Ok(compact(config, matrix))
}

fn parse_latency(config: &LatencyConfig) -> Result<LatencyMatrix> {
    LatencyMatrix::load(&config.path, config.size, config.index_base, config.threshold)
        .wrap_err("Failed to load latency dataset")
}

fn compact(config: &LatencyConfig, matrix: LatencyMatrix) -> LatencyMatrix {
    match config.min_reachable {
        Some(min) => matrix.compact(min),
        None => matrix,
    }
}

/// Run the latency-constrained adaptive simulation. Each trial writes
/// `adaptive_<trial>.csv`; the summary goes to `adaptive_summary.json`.
pub fn run_adaptive(config: &SimulationConfig) -> Result<AdaptiveSummary> {
    let adaptive = config
        .adaptive
        .as_ref()
        .ok_or_else(|| eyre!("Configuration has no adaptive section"))?;
    let output_dir = &config.general.output_dir;
    create_output_dir(output_dir)?;

    let latency = load_latency(&adaptive.latency)?;
    let saturator = Saturator::new(&latency, adaptive.k, adaptive.max_degree)?
        .with_max_attempts(config.construction.saturation_attempts)?;

    let master = master_seed(config);
    let seeds = draw_seeds(master, adaptive.trials);
    info!(
        "Running {} adaptive trials over {} nodes, {} rounds each (master seed {})",
        adaptive.trials,
        latency.size(),
        adaptive.rounds,
        master
    );

    let trials: Vec<AdaptiveTrialSummary> = seeds
        .par_iter()
        .enumerate()
        .map(|(trial, &seed)| run_adaptive_trial(&saturator, adaptive, output_dir, trial, seed))
        .collect::<Result<Vec<_>>>()?;

    let summary = AdaptiveSummary {
        metadata: metadata(RunMode::Adaptive, master, adaptive.trials),
        size: latency.size(),
        k: adaptive.k,
        max_degree: adaptive.max_degree,
        average_ping: Some(latency.average_ping()),
        best_avg_distance: latency.average_shortest_distance(),
        trials,
    };
    generate_json_report(&summary, &output_dir.join("adaptive_summary.json"))?;

    Ok(summary)
}

fn run_adaptive_trial(
    saturator: &Saturator<'_>,
    adaptive: &AdaptiveConfig,
    output_dir: &Path,
    trial: usize,
    seed: u64,
) -> Result<AdaptiveTrialSummary> {
    let mut rng = StdRng::seed_from_u64(seed);
    let build = saturator.build(&mut rng)?;
    let mut graph = build.graph;

    let probes = adaptive.probe_fractions();
    let csv_path: PathBuf = output_dir.join(format!("adaptive_{trial}.csv"));
    let mut writer = RoundWriter::create(&csv_path, &probes, adaptive.max_degree)?;

    let mut initial_avg_distance = None;
    let mut final_avg_distance = 0.0;
    let mut final_unreachable = 0;
    let mut total_route_kills = 0;
    let mut total_rebooted = 0;

    for round in 0..adaptive.rounds {
        let probe_values: Vec<f64> = probes
            .par_iter()
            .map(|&alive| {
                let mut copy = graph.clone();
                kill_nodes(&mut copy, alive);
                unavailability(&copy)
            })
            .collect();

        let mut rebooted = 0;
        let mut reboot_unsaturated = 0;
        if adaptive.reboot_probability > 0.0 {
            let outcome = reboot(&mut graph, adaptive.reboot_probability, &mut rng);
            for &node in &outcome.needs_saturation {
                if !saturator.saturate_node(&mut graph, node, &mut rng) {
                    reboot_unsaturated += 1;
                }
            }
            if reboot_unsaturated > 0 {
                warn!("Round {round}: {reboot_unsaturated} rebooted nodes could not resaturate");
            }
            rebooted = outcome.rebooted.len();
        }

        let report = run_round(&mut graph, saturator, adaptive.n_refresh, &mut rng);
        let size = graph.size();
        let pairs = size * size.saturating_sub(1);

        writer.write_round(&RoundRow {
            round,
            avg_distance: report.avg_distance,
            unreachable: report.unreachable,
            disconnection_probability: if pairs == 0 {
                0.0
            } else {
                report.unreachable as f64 / pairs as f64
            },
            route_kills: report.route_kills(),
            unsaturated: report.unsaturated + reboot_unsaturated,
            rebooted,
            unavailability: &probe_values,
            degree_histogram: &report.degree_histogram,
        })?;

        initial_avg_distance.get_or_insert(report.avg_distance);
        final_avg_distance = report.avg_distance;
        final_unreachable = report.unreachable;
        total_route_kills += report.route_kills();
        total_rebooted += rebooted;

        info!("Trial {}: round {}/{} finished", trial, round + 1, adaptive.rounds);
    }

    if !build.unsaturated.is_empty() {
        warn!(
            "Trial {}: {} nodes were never fully saturated by the initial build",
            trial,
            build.unsaturated.len()
        );
    }

    Ok(AdaptiveTrialSummary {
        trial,
        seed,
        initially_unsaturated: build.unsaturated.len(),
        rounds: adaptive.rounds,
        initial_avg_distance: initial_avg_distance.unwrap_or(0.0),
        final_avg_distance,
        final_unreachable,
        total_route_kills,
        total_rebooted,
        csv_path: writer.path().display().to_string(),
    })
}
