//! Resilience analysis over overlay graphs.
//!
//! This module provides reachability queries, the randomized min-cut
//! estimator, latency route accounting for the adaptive loop, streaming
//! result aggregation and the output writers.

pub mod min_cut;
pub mod reachability;
pub mod report;
pub mod results;
pub mod routes;
pub mod types;

pub use min_cut::{MinCutEstimate, MinCutEstimator};
pub use reachability::{count_unreachable, distances_from, eccentricity, unavailability, UNREACHABLE};
pub use report::{generate_json_report, generate_text_report, write_sweep_csv, RoundRow, RoundWriter};
pub use results::{Results, ResultsAccumulator};
pub use routes::{compute_routes, run_round, select_weak_edges, RoundReport, RouteSample};
pub use types::*;
