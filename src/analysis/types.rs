//! Report data types shared by the drivers and the writers.

use serde::{Deserialize, Serialize};

use super::results::Results;

/// Which driver produced a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Sweep,
    Adaptive,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Sweep => write!(f, "sweep"),
            RunMode::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Metadata block at the top of every JSON summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub mode: RunMode,
    /// RFC 3339 UTC time the summary was written
    pub generated_at: String,
    pub master_seed: u64,
    pub threads: usize,
    pub tasks: usize,
}

/// One unconstrained parameter combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub size: usize,
    pub k: usize,
    pub max_degree: usize,
    pub alive: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: SweepParams,
    pub runs: usize,
    pub results: Results,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub metadata: ReportMetadata,
    pub entries: Vec<SweepEntry>,
}

/// Whole-trial figures from an adaptive run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveTrialSummary {
    pub trial: usize,
    pub seed: u64,
    /// Nodes left below `k` generated edges by the initial build
    pub initially_unsaturated: usize,
    pub rounds: usize,
    pub initial_avg_distance: f64,
    pub final_avg_distance: f64,
    pub final_unreachable: usize,
    pub total_route_kills: usize,
    pub total_rebooted: usize,
    pub csv_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveSummary {
    pub metadata: ReportMetadata,
    pub size: usize,
    pub k: usize,
    pub max_degree: usize,
    pub average_ping: Option<f64>,
    /// Mean shortest latency with every feasible link present
    pub best_avg_distance: Option<f64>,
    pub trials: Vec<AdaptiveTrialSummary>,
}
