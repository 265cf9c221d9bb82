//! Simulation configuration.
//!
//! Mirrors the YAML file accepted by `overlaysim`. Every section has serde
//! defaults so a minimal file only names the driver section it runs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{MinCutEstimator, SweepParams};
use crate::latency::IndexBase;
use crate::latency::matrix::DEFAULT_THRESHOLD;
use crate::topology::builder::{DEFAULT_BUILD_ATTEMPTS, DEFAULT_DEGREE_MARGIN};
use crate::topology::saturation::DEFAULT_SATURATION_ATTEMPTS;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub construction: ConstructionConfig,
    #[serde(default)]
    pub min_cut: MinCutConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<AdaptiveConfig>,
}

/// Settings shared by both drivers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Master seed; derived from the clock when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Worker threads, 0 lets rayon decide
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Attempt caps and the degree margin used while building graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionConfig {
    /// Capacity kept free on not-yet-processed nodes
    #[serde(default = "default_degree_margin")]
    pub degree_margin: usize,
    /// Random draws per missing edge in unconstrained builds
    #[serde(default = "default_build_attempts")]
    pub build_attempts: usize,
    /// Random draws per edge search in latency-constrained builds
    #[serde(default = "default_saturation_attempts")]
    pub saturation_attempts: usize,
}

/// Work budgets for the min-cut estimator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinCutConfig {
    /// Trials per estimate, `⌈ln n⌉` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trials: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Wall-clock budget per trial, e.g. "30s"
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub time_budget: Option<Duration>,
}

impl MinCutConfig {
    pub fn estimator(&self) -> MinCutEstimator {
        let mut estimator = MinCutEstimator::new();
        if let Some(trials) = self.trials {
            estimator = estimator.with_trials(trials);
        }
        if let Some(depth) = self.max_depth {
            estimator = estimator.with_max_depth(depth);
        }
        if let Some(budget) = self.time_budget {
            estimator = estimator.with_time_budget(budget);
        }
        estimator
    }
}

/// Unconstrained parameter sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub sizes: Vec<usize>,
    pub ks: Vec<usize>,
    /// `max_degree = max_degree_factor * k`
    #[serde(default = "default_max_degree_factor")]
    pub max_degree_factor: usize,
    /// Surviving fractions applied with `kill_nodes` after each build
    #[serde(default = "default_alive_fractions")]
    pub alive_fractions: Vec<f64>,
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// BFS sources sampled per run for the distance distribution
    #[serde(default = "default_distance_sources")]
    pub distance_sources: usize,
    /// Last bucket of the distance histogram
    #[serde(default = "default_max_distance")]
    pub max_distance: usize,
    #[serde(default)]
    pub min_cut: bool,
}

impl SweepConfig {
    /// Every parameter combination, sizes outermost.
    pub fn parameter_sets(&self) -> Vec<SweepParams> {
        let mut sets = Vec::new();
        for &size in &self.sizes {
            for &k in &self.ks {
                for &alive in &self.alive_fractions {
                    sets.push(SweepParams {
                        size,
                        k,
                        max_degree: k * self.max_degree_factor,
                        alive,
                    });
                }
            }
        }
        sets
    }
}

/// Latency dataset location and parsing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    pub path: PathBuf,
    /// Node count declared by the dataset
    pub size: usize,
    #[serde(default)]
    pub index_base: IndexBase,
    /// Costs below this become infeasible
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Drop nodes with at most this many feasible peers before simulating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reachable: Option<usize>,
    /// Parsed-matrix cache, created on first use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
}

/// Latency-constrained adaptive optimisation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub latency: LatencyConfig,
    pub k: usize,
    pub max_degree: usize,
    pub rounds: usize,
    #[serde(default = "default_n_refresh")]
    pub n_refresh: usize,
    #[serde(default = "default_runs")]
    pub trials: usize,
    /// Step between churn-probe fractions, 0 disables probes
    #[serde(default)]
    pub kill_step: f64,
    #[serde(default)]
    pub reboot_probability: f64,
}

impl AdaptiveConfig {
    /// Surviving fractions `step, 2·step, ...` strictly below one.
    pub fn probe_fractions(&self) -> Vec<f64> {
        if self.kill_step <= 0.0 {
            return Vec::new();
        }
        (1..)
            .map(|i| i as f64 * self.kill_step)
            .take_while(|&alive| alive < 1.0 - 1e-9)
            .collect()
    }
}

impl SimulationConfig {
    /// Reject degenerate parameters before any trial starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !LOG_LEVELS.contains(&self.general.log_level.to_ascii_lowercase().as_str()) {
            return Err(ValidationError::InvalidGeneral(format!(
                "unknown log_level '{}'",
                self.general.log_level
            )));
        }

        if self.construction.build_attempts == 0 || self.construction.saturation_attempts == 0 {
            return Err(ValidationError::InvalidParameters(
                "attempt caps must be positive".to_string(),
            ));
        }
        if self.min_cut.trials == Some(0) {
            return Err(ValidationError::InvalidParameters(
                "min_cut.trials must be positive".to_string(),
            ));
        }

        if let Some(sweep) = &self.sweep {
            Self::validate_sweep(sweep)?;
        }
        if let Some(adaptive) = &self.adaptive {
            Self::validate_adaptive(adaptive)?;
        }

        Ok(())
    }

    fn validate_sweep(sweep: &SweepConfig) -> Result<(), ValidationError> {
        if sweep.sizes.is_empty() || sweep.ks.is_empty() || sweep.alive_fractions.is_empty() {
            return Err(ValidationError::InvalidSweep(
                "sizes, ks and alive_fractions must be non-empty".to_string(),
            ));
        }
        if sweep.runs == 0 || sweep.distance_sources == 0 {
            return Err(ValidationError::InvalidSweep(
                "runs and distance_sources must be positive".to_string(),
            ));
        }
        if sweep.max_degree_factor == 0 {
            return Err(ValidationError::InvalidSweep(
                "max_degree_factor must be at least 1".to_string(),
            ));
        }
        if let Some(alive) = sweep.alive_fractions.iter().find(|a| !(**a > 0.0 && **a <= 1.0)) {
            return Err(ValidationError::InvalidSweep(format!(
                "alive fraction {alive} outside (0, 1]"
            )));
        }

        for params in sweep.parameter_sets() {
            if params.k == 0 {
                return Err(ValidationError::InvalidParameters("k must be positive".to_string()));
            }
            if params.size <= params.k {
                return Err(ValidationError::InvalidParameters(format!(
                    "size {} too small for k = {}",
                    params.size, params.k
                )));
            }
        }
        Ok(())
    }

    fn validate_adaptive(adaptive: &AdaptiveConfig) -> Result<(), ValidationError> {
        let latency = &adaptive.latency;
        if latency.size < 2 {
            return Err(ValidationError::InvalidAdaptive(
                "latency.size must be at least 2".to_string(),
            ));
        }
        if !latency.threshold.is_finite() || latency.threshold < 0.0 {
            return Err(ValidationError::InvalidAdaptive(format!(
                "latency.threshold {} must be a finite non-negative number",
                latency.threshold
            )));
        }

        if adaptive.k == 0 {
            return Err(ValidationError::InvalidParameters("k must be positive".to_string()));
        }
        if adaptive.k > adaptive.max_degree {
            return Err(ValidationError::InvalidParameters(format!(
                "k = {} exceeds max_degree = {}",
                adaptive.k, adaptive.max_degree
            )));
        }
        if latency.size <= adaptive.k {
            return Err(ValidationError::InvalidParameters(format!(
                "size {} too small for k = {}",
                latency.size, adaptive.k
            )));
        }
        if adaptive.n_refresh > adaptive.k {
            return Err(ValidationError::InvalidAdaptive(format!(
                "n_refresh = {} exceeds k = {}",
                adaptive.n_refresh, adaptive.k
            )));
        }
        if adaptive.trials == 0 {
            return Err(ValidationError::InvalidAdaptive("trials must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&adaptive.kill_step) {
            return Err(ValidationError::InvalidAdaptive(format!(
                "kill_step {} outside [0, 1)",
                adaptive.kill_step
            )));
        }
        if !(0.0..=1.0).contains(&adaptive.reboot_probability) {
            return Err(ValidationError::InvalidAdaptive(format!(
                "reboot_probability {} outside [0, 1]",
                adaptive.reboot_probability
            )));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid simulation parameters: {0}")]
    InvalidParameters(String),
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid sweep configuration: {0}")]
    InvalidSweep(String),
    #[error("Invalid adaptive configuration: {0}")]
    InvalidAdaptive(String),
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("overlaysim_output")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_degree_margin() -> usize {
    DEFAULT_DEGREE_MARGIN
}

fn default_build_attempts() -> usize {
    DEFAULT_BUILD_ATTEMPTS
}

fn default_saturation_attempts() -> usize {
    DEFAULT_SATURATION_ATTEMPTS
}

fn default_max_degree_factor() -> usize {
    3
}

fn default_alive_fractions() -> Vec<f64> {
    vec![1.0]
}

fn default_runs() -> usize {
    1
}

fn default_distance_sources() -> usize {
    10
}

fn default_max_distance() -> usize {
    20
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_n_refresh() -> usize {
    1
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: None,
            threads: 0,
            output_dir: default_output_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            degree_margin: DEFAULT_DEGREE_MARGIN,
            build_attempts: DEFAULT_BUILD_ATTEMPTS,
            saturation_attempts: DEFAULT_SATURATION_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep() -> SweepConfig {
        SweepConfig {
            sizes: vec![50, 100],
            ks: vec![2, 4],
            max_degree_factor: 3,
            alive_fractions: vec![1.0, 0.5],
            runs: 2,
            distance_sources: 5,
            max_distance: 20,
            min_cut: false,
        }
    }

    #[test]
    fn test_parameter_sets_order() {
        let sets = sweep().parameter_sets();
        assert_eq!(sets.len(), 8);
        assert_eq!(
            sets[0],
            SweepParams {
                size: 50,
                k: 2,
                max_degree: 6,
                alive: 1.0
            }
        );
        assert_eq!(sets[3].max_degree, 12);
        assert_eq!(sets[4].size, 100);
    }

    #[test]
    fn test_rejects_size_not_above_k() {
        let mut config = SimulationConfig {
            sweep: Some(sweep()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.sweep.as_mut().unwrap().sizes.push(4);
        assert!(matches!(config.validate(), Err(ValidationError::InvalidParameters(_))));
    }

    #[test]
    fn test_rejects_bad_alive_fraction() {
        let mut s = sweep();
        s.alive_fractions = vec![0.0];
        let config = SimulationConfig {
            sweep: Some(s),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidSweep(_))));
    }

    #[test]
    fn test_probe_fractions() {
        let adaptive = AdaptiveConfig {
            latency: LatencyConfig {
                path: PathBuf::from("latencies"),
                size: 10,
                index_base: IndexBase::One,
                threshold: DEFAULT_THRESHOLD,
                min_reachable: None,
                cache: None,
            },
            k: 2,
            max_degree: 6,
            rounds: 1,
            n_refresh: 1,
            trials: 1,
            kill_step: 0.25,
            reboot_probability: 0.0,
        };
        assert_eq!(adaptive.probe_fractions(), vec![0.25, 0.5, 0.75]);

        let disabled = AdaptiveConfig {
            kill_step: 0.0,
            ..adaptive
        };
        assert!(disabled.probe_fractions().is_empty());
    }

    #[test]
    fn test_min_cut_estimator_from_config() {
        let config = MinCutConfig {
            trials: Some(4),
            max_depth: Some(3),
            time_budget: Some(Duration::from_secs(2)),
        };
        let expected = MinCutEstimator::new()
            .with_trials(4)
            .with_max_depth(3)
            .with_time_budget(Duration::from_secs(2));
        assert_eq!(config.estimator(), expected);
    }
}
