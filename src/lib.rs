//! # Overlaysim - Resilience simulator for peer-to-peer overlay topologies
//!
//! This library builds randomly wired overlay networks and measures how
//! connected, how far apart and how cut-resistant they stay as nodes fail,
//! churn, or have their least useful links replaced.
//!
//! ## Overview
//!
//! Overlaysim is an offline analytical model. It never opens a socket: every
//! trial builds an in-memory graph, mutates it, measures it and discards it.
//! Trials are independent and run in parallel, each with its own generator
//! seeded from a single master seed, so a run is fully reproducible.
//!
//! ## Key Features
//!
//! - **Unconstrained construction**: degree-capped random graphs with a
//!   capacity margin reserved for nodes not yet processed
//! - **Latency-constrained construction**: edges only where a latency dataset
//!   says a link is feasible, with per-node ownership of generated edges
//! - **Reachability**: BFS hop distances, unreachable counts, unavailability
//! - **Min cut**: Karger-Stein style contraction with optional work budgets
//! - **Adaptive rounds**: latency-weighted shortest paths decide which owned
//!   edges carry the fewest routes; those are replaced each round
//! - **Churn**: truncating node kills and edge-resetting reboots
//!
//! ## Architecture
//!
//! - `latency`: latency dataset parsing, compaction and binary cache
//! - `topology`: the overlay graph, both construction modes and churn
//! - `analysis`: reachability, min cut, route accounting, result aggregation
//!   and report writers
//! - `config`: typed configuration structures and validation
//! - `config_loader`: YAML loading and CLI overrides
//! - `orchestrator`: the sweep and adaptive batch drivers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use overlaysim::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("sweep.yaml"))?;
//! let summary = orchestrator::run_sweep(&config)?;
//! println!("{} parameter sets", summary.entries.len());
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   seed: 42
//!   output_dir: "results"
//!
//! sweep:
//!   sizes: [200, 400, 800]
//!   ks: [5, 10]
//!   alive_fractions: [1.0, 0.5]
//!   runs: 50
//!   min_cut: true
//!
//! adaptive:
//!   latency:
//!     path: "latency/pw-1715-latencies"
//!     size: 1715
//!     min_reachable: 20
//!   k: 10
//!   max_degree: 30
//!   rounds: 300
//!   kill_step: 0.05
//! ```
//!
//! ## Error Handling
//!
//! Building blocks return typed `thiserror` errors (`BuildError`,
//! `LatencyError`, `ValidationError`). Loaders, drivers and binaries wrap them
//! into `color_eyre` reports with context. Exhausted edge searches are not
//! errors; they are counted and reported alongside the results.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod latency;
pub mod orchestrator;
pub mod topology;
