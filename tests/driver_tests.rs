#[cfg(test)]
mod driver_tests {
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use tempfile::{tempdir, NamedTempFile};

    use overlaysim::config::{
        AdaptiveConfig, ConstructionConfig, LatencyConfig, SimulationConfig, SweepConfig,
    };
    use overlaysim::config_loader::load_config;
    use overlaysim::latency::matrix::DEFAULT_THRESHOLD;
    use overlaysim::latency::{save_cache, CacheKey, IndexBase, LatencyMatrix};
    use overlaysim::orchestrator::{load_latency, run_adaptive, run_sweep};

    fn sweep_config(output_dir: &Path, seed: u64) -> SimulationConfig {
        let mut config = SimulationConfig {
            construction: ConstructionConfig {
                degree_margin: 2,
                ..Default::default()
            },
            sweep: Some(SweepConfig {
                sizes: vec![40],
                ks: vec![3],
                max_degree_factor: 3,
                alive_fractions: vec![1.0, 0.5],
                runs: 2,
                distance_sources: 5,
                max_distance: 20,
                min_cut: true,
            }),
            ..Default::default()
        };
        config.general.seed = Some(seed);
        config.general.output_dir = output_dir.to_path_buf();
        config
    }

    /// One-based dataset over `size` nodes; every pair is feasible.
    fn write_dataset(size: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# synthetic pairwise latencies").unwrap();
        for a in 1..=size {
            for b in (a + 1)..=size {
                writeln!(file, "{} {} {}", a, b, 150 + (a * 7 + b * 3) % 50).unwrap();
            }
        }
        file.flush().unwrap();
        file
    }

    fn adaptive_config(dataset: &Path, cache: Option<PathBuf>, output_dir: &Path) -> SimulationConfig {
        let mut config = SimulationConfig {
            adaptive: Some(AdaptiveConfig {
                latency: LatencyConfig {
                    path: dataset.to_path_buf(),
                    size: 12,
                    index_base: IndexBase::One,
                    threshold: 100.0,
                    min_reachable: None,
                    cache,
                },
                k: 2,
                max_degree: 6,
                rounds: 3,
                n_refresh: 1,
                trials: 2,
                kill_step: 0.5,
                reboot_probability: 0.2,
            }),
            ..Default::default()
        };
        config.general.seed = Some(11);
        config.general.output_dir = output_dir.to_path_buf();
        config
    }

    #[test]
    fn test_sweep_writes_table_and_summary() {
        let dir = tempdir().unwrap();
        let config = sweep_config(dir.path(), 42);
        config.validate().unwrap();

        let summary = run_sweep(&config).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.metadata.tasks, 4);
        assert_eq!(summary.metadata.master_seed, 42);

        let full = &summary.entries[0].results;
        assert_eq!(full.degree_samples, 80);
        assert_eq!(full.distance_samples, 2 * 5 * 39);
        assert!(full.min_cut.is_some());

        let halved = &summary.entries[1].results;
        assert_eq!(halved.degree_samples, 40);

        let csv = fs::read_to_string(dir.path().join("sweep.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("n,k,max_degree,alive,avg_distance"));
        assert!(lines[1].starts_with("40,3,9,1,"));
        assert!(lines[2].starts_with("40,3,9,0.5,"));

        assert!(dir.path().join("sweep_summary.json").exists());
        assert!(dir.path().join("sweep_summary.txt").exists());
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        run_sweep(&sweep_config(first.path(), 5)).unwrap();
        run_sweep(&sweep_config(second.path(), 5)).unwrap();

        let a = fs::read_to_string(first.path().join("sweep.csv")).unwrap();
        let b = fs::read_to_string(second.path().join("sweep.csv")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_adaptive_rows_and_cache() {
        let dataset = write_dataset(12);
        let dir = tempdir().unwrap();
        let cache = dir.path().join("latency.cache");
        let config = adaptive_config(dataset.path(), Some(cache.clone()), &dir.path().join("first"));
        config.validate().unwrap();

        let summary = run_adaptive(&config).unwrap();
        assert!(cache.exists());
        assert_eq!(summary.size, 12);
        assert_eq!(summary.trials.len(), 2);

        for trial in 0..2 {
            let path = dir.path().join("first").join(format!("adaptive_{trial}.csv"));
            let content = fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines.len(), 4);
            assert!(lines[0].contains("unavailability_0.5"));
            assert!(lines[0].ends_with("degree_6,degree_over"));
            assert!(lines[1].starts_with("0,"));
            let columns = lines[0].split(',').count();
            assert!(lines[1..].iter().all(|row| row.split(',').count() == columns));
        }

        // Second run reads the cache and must produce identical rows
        let again = adaptive_config(dataset.path(), Some(cache), &dir.path().join("second"));
        run_adaptive(&again).unwrap();
        for trial in 0..2 {
            let name = format!("adaptive_{trial}.csv");
            assert_eq!(
                fs::read_to_string(dir.path().join("first").join(&name)).unwrap(),
                fs::read_to_string(dir.path().join("second").join(&name)).unwrap()
            );
        }
    }

    #[test]
    fn test_load_latency_compacts() {
        let mut file = NamedTempFile::new().unwrap();
        // Node 3 only reaches node 0
        writeln!(file, "0 1 150\n0 2 160\n1 2 170\n0 3 180").unwrap();

        let config = LatencyConfig {
            path: file.path().to_path_buf(),
            size: 4,
            index_base: IndexBase::Zero,
            threshold: DEFAULT_THRESHOLD,
            min_reachable: Some(1),
            cache: None,
        };
        let matrix = load_latency(&config).unwrap();
        assert_eq!(matrix.size(), 3);
        assert_eq!(matrix.get(1, 2), 170);
    }

    #[test]
    fn test_missing_dataset_is_fatal() {
        let dir = tempdir().unwrap();
        let config = adaptive_config(&dir.path().join("missing"), None, dir.path());
        assert!(run_adaptive(&config).is_err());
    }

    #[test]
    fn test_yaml_config_drives_sweep() {
        let dir = tempdir().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "general:\n  seed: 3\n  output_dir: {:?}\nconstruction:\n  degree_margin: 2\nsweep:\n  sizes: [30]\n  ks: [2]\n  runs: 1\n",
            dir.path()
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        let summary = run_sweep(&config).unwrap();
        assert_eq!(summary.entries[0].params.max_degree, 6);
        assert!(dir.path().join("sweep.csv").exists());
    }

    fn latency_config(dataset: &Path, size: usize, threshold: f64, cache: PathBuf) -> LatencyConfig {
        LatencyConfig {
            path: dataset.to_path_buf(),
            size,
            index_base: IndexBase::Zero,
            threshold,
            min_reachable: None,
            cache: Some(cache),
        }
    }

    #[test]
    fn test_cache_rebuilt_when_threshold_changes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0 1 150\n0 2 160\n1 2 170").unwrap();
        file.flush().unwrap();
        let dir = tempdir().unwrap();
        let cache = dir.path().join("latency.cache");

        let loose = load_latency(&latency_config(file.path(), 3, 100.0, cache.clone())).unwrap();
        assert_eq!(loose.feasible_pairs(), 3);

        let strict = load_latency(&latency_config(file.path(), 3, 200.0, cache.clone())).unwrap();
        assert_eq!(strict.feasible_pairs(), 0);

        let grown = load_latency(&latency_config(file.path(), 40, 200.0, cache)).unwrap();
        assert_eq!(grown.size(), 40);
    }

    #[test]
    fn test_cache_rebuilt_when_dataset_changes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0 1 150").unwrap();
        file.flush().unwrap();
        let dir = tempdir().unwrap();
        let cache = dir.path().join("latency.cache");

        let first = load_latency(&latency_config(file.path(), 3, 100.0, cache.clone())).unwrap();
        assert_eq!(first.feasible_pairs(), 1);

        writeln!(file, "1 2 180").unwrap();
        file.flush().unwrap();
        let second = load_latency(&latency_config(file.path(), 3, 100.0, cache)).unwrap();
        assert_eq!(second.feasible_pairs(), 2);
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0 1 150").unwrap();
        file.flush().unwrap();
        let dir = tempdir().unwrap();
        let cache = dir.path().join("latency.cache");

        // Key matches the request but the matrix is short of values
        let key = CacheKey::for_dataset(file.path(), 10, IndexBase::Zero, 100.0).unwrap();
        let short: LatencyMatrix =
            serde_json::from_str(r#"{"size": 10, "values": [150, 150, 150, 150]}"#).unwrap();
        save_cache(&key, &short, &cache).unwrap();

        assert!(load_latency(&latency_config(file.path(), 10, 100.0, cache)).is_err());
    }

    #[test]
    fn test_adaptive_summary_reports_best_distance() {
        let dataset = write_dataset(12);
        let dir = tempdir().unwrap();
        let summary = run_adaptive(&adaptive_config(dataset.path(), None, dir.path())).unwrap();

        let best = summary.best_avg_distance.unwrap();
        let ping = summary.average_ping.unwrap();
        assert!(best > 0.0 && best <= ping);
    }

    #[test]
    fn test_reboot_failures_are_counted() {
        // Node 4 has no feasible peer and can never resaturate
        let mut file = NamedTempFile::new().unwrap();
        for a in 1..=12 {
            for b in (a + 1)..=12 {
                let cost = if a == 4 || b == 4 { 20 } else { 180 };
                writeln!(file, "{a} {b} {cost}").unwrap();
            }
        }
        file.flush().unwrap();

        let dir = tempdir().unwrap();
        let mut config = adaptive_config(file.path(), None, dir.path());
        if let Some(adaptive) = config.adaptive.as_mut() {
            adaptive.trials = 1;
            adaptive.reboot_probability = 1.0;
        }
        run_adaptive(&config).unwrap();

        let content = fs::read_to_string(dir.path().join("adaptive_0.csv")).unwrap();
        let mut lines = content.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let column = header.iter().position(|&h| h == "unsaturated").unwrap();
        for row in lines {
            let unsaturated: usize = row.split(',').nth(column).unwrap().parse().unwrap();
            // Once after the reboot and once more in the round itself
            assert!(unsaturated >= 2, "row {row}");
        }
    }
}
