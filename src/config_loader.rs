use crate::config::SimulationConfig;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<SimulationConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file {}", config_path.display()))?;

    let config: SimulationConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub seed: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(config: &mut SimulationConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(seed) = overrides.seed {
        info!("Overriding seed: {}", seed);
        config.general.seed = Some(seed);
    }
    if let Some(dir) = &overrides.output_dir {
        config.general.output_dir = dir.clone();
    }
    if let Some(threads) = overrides.threads {
        config.general.threads = threads;
    }
    if let Some(level) = &overrides.log_level {
        config.general.log_level = level.clone();
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_sweep_config() {
        let yaml = r#"
general:
  seed: 42
sweep:
  sizes: [100, 1000]
  ks: [3, 5]
  alive_fractions: [1.0, 0.5]
min_cut:
  time_budget: "30s"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.general.seed, Some(42));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.construction.degree_margin, 10);
        assert_eq!(config.construction.saturation_attempts, 50);
        assert_eq!(config.min_cut.time_budget, Some(Duration::from_secs(30)));

        let sweep = config.sweep.unwrap();
        assert_eq!(sweep.max_degree_factor, 3);
        assert_eq!(sweep.max_distance, 20);
        assert_eq!(sweep.parameter_sets().len(), 8);
        assert!(config.adaptive.is_none());
    }

    #[test]
    fn test_load_adaptive_config() {
        let yaml = r#"
adaptive:
  latency:
    path: "data/latencies"
    size: 1715
    index_base: zero
    min_reachable: 20
  k: 10
  max_degree: 30
  rounds: 300
  kill_step: 0.05
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        let adaptive = config.adaptive.unwrap();
        assert_eq!(adaptive.latency.size, 1715);
        assert_eq!(adaptive.latency.threshold, 100.0);
        assert_eq!(adaptive.latency.min_reachable, Some(20));
        assert_eq!(adaptive.n_refresh, 1);
        assert_eq!(adaptive.probe_fractions().len(), 19);
    }

    #[test]
    fn test_rejects_k_above_max_degree() {
        let yaml = r#"
adaptive:
  latency:
    path: "latencies"
    size: 100
  k: 10
  max_degree: 5
  rounds: 1
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("exceeds max_degree"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "sweep:\n  sizes: [20]\n  ks: [2]\n").unwrap();
        let mut config = load_config(temp_file.path()).unwrap();

        let overrides = CliOverrides {
            seed: Some(7),
            threads: Some(2),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.general.seed, Some(7));
        assert_eq!(config.general.threads, 2);
        assert_eq!(config.general.log_level, "debug");

        let bad = CliOverrides {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut config, &bad).is_err());
    }
}
