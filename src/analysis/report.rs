//! Output writers: per-round CSV rows, sweep tables and JSON/text summaries.
//!
//! CSV rows are flushed and synced to disk one at a time so a killed run
//! loses at most the row being written.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::types::{AdaptiveSummary, SweepEntry, SweepSummary};

/// Append-only CSV file with one durable write per row
#[derive(Debug)]
pub struct RowWriter {
    out: BufWriter<File>,
    path: PathBuf,
    columns: usize,
}

impl RowWriter {
    /// Create (truncating) `path` and write the header line.
    pub fn create(path: &Path, header: &[String]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

        let mut writer = Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            columns: header.len(),
        };
        writer.write_row(header)?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_row(&mut self, fields: &[String]) -> Result<()> {
        debug_assert_eq!(fields.len(), self.columns);
        writeln!(self.out, "{}", fields.join(","))
            .with_context(|| format!("Failed to write row to {}", self.path.display()))?;
        self.out
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        self.out
            .get_ref()
            .sync_data()
            .with_context(|| format!("Failed to sync {}", self.path.display()))?;
        Ok(())
    }
}

/// Measurements of one adaptive round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRow<'a> {
    pub round: usize,
    pub avg_distance: f64,
    pub unreachable: usize,
    pub disconnection_probability: f64,
    pub route_kills: usize,
    pub unsaturated: usize,
    pub rebooted: usize,
    /// Unavailability after each churn probe, in probe order
    pub unavailability: &'a [f64],
    pub degree_histogram: &'a [usize],
}

/// CSV writer for adaptive runs with a fixed degree bucket range
#[derive(Debug)]
pub struct RoundWriter {
    rows: RowWriter,
    probes: usize,
    max_degree: usize,
}

impl RoundWriter {
    /// `probes` labels the churn-probe columns (surviving fractions);
    /// degree buckets span `0..=max_degree` plus one overflow column.
    pub fn create(path: &Path, probes: &[f64], max_degree: usize) -> Result<Self> {
        let mut header: Vec<String> = [
            "round",
            "avg_distance",
            "unreachable",
            "disconnection_probability",
            "route_kills",
            "unsaturated",
            "rebooted",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(probes.iter().map(|alive| format!("unavailability_{alive}")));
        header.extend((0..=max_degree).map(|d| format!("degree_{d}")));
        header.push("degree_over".to_string());

        Ok(Self {
            rows: RowWriter::create(path, &header)?,
            probes: probes.len(),
            max_degree,
        })
    }

    pub fn path(&self) -> &Path {
        self.rows.path()
    }

    pub fn write_round(&mut self, row: &RoundRow<'_>) -> Result<()> {
        debug_assert_eq!(row.unavailability.len(), self.probes);

        let mut fields = vec![
            row.round.to_string(),
            format!("{:.4}", row.avg_distance),
            row.unreachable.to_string(),
            format!("{:.6}", row.disconnection_probability),
            row.route_kills.to_string(),
            row.unsaturated.to_string(),
            row.rebooted.to_string(),
        ];
        fields.extend(row.unavailability.iter().map(|u| format!("{u:.6}")));
        fields.extend(bucketize(row.degree_histogram, self.max_degree).iter().map(usize::to_string));
        self.rows.write_row(&fields)
    }
}

/// Fold a raw histogram into `0..=max` buckets plus a trailing overflow bucket.
fn bucketize(histogram: &[usize], max: usize) -> Vec<usize> {
    let mut buckets = vec![0usize; max + 2];
    for (degree, &count) in histogram.iter().enumerate() {
        buckets[degree.min(max + 1)] += count;
    }
    buckets
}

pub const SWEEP_HEADER: [&str; 10] = [
    "n",
    "k",
    "max_degree",
    "alive",
    "avg_distance",
    "disconnection_probability",
    "max_distance",
    "min_cut",
    "under_provisioned",
    "degree_at_max",
];

/// Write the per-parameter sweep table.
pub fn write_sweep_csv(entries: &[SweepEntry], output_path: &Path) -> Result<()> {
    let header: Vec<String> = SWEEP_HEADER.iter().map(|s| s.to_string()).collect();
    let mut rows = RowWriter::create(output_path, &header)?;

    for entry in entries {
        let p = &entry.params;
        let r = &entry.results;
        rows.write_row(&[
            p.size.to_string(),
            p.k.to_string(),
            p.max_degree.to_string(),
            p.alive.to_string(),
            format!("{:.4}", r.avg_distance),
            format!("{:.6}", r.disconnection_probability),
            r.max_distance_reached.to_string(),
            r.min_cut.map_or_else(String::new, |c| c.to_string()),
            r.under_provisioned.to_string(),
            format!("{:.4}", r.degree_at_max()),
        ])?;
    }

    log::info!("Sweep table written to {}", output_path.display());
    Ok(())
}

/// Generate JSON report
pub fn generate_json_report<T: Serialize>(report: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Generate human-readable text report for a sweep
pub fn generate_text_report(summary: &SweepSummary, output_path: &Path) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                     OVERLAY RESILIENCE SWEEP".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Generated: {}", summary.metadata.generated_at));
    lines.push(format!("Master seed: {}", summary.metadata.master_seed));
    lines.push(format!("Tasks: {}", summary.metadata.tasks));
    lines.push(String::new());

    for entry in &summary.entries {
        let p = &entry.params;
        let r = &entry.results;
        lines.push(format!(
            "n={} k={} max_degree={} alive={} ({} runs)",
            p.size, p.k, p.max_degree, p.alive, entry.runs
        ));
        lines.push(format!("  Avg distance:      {:.3}", r.avg_distance));
        lines.push(format!("  Max distance:      {}", r.max_distance_reached));
        lines.push(format!(
            "  Disconnection:     {:.4}%",
            r.disconnection_probability * 100.0
        ));
        if let Some(cut) = r.min_cut {
            lines.push(format!("  Min cut:           {cut}"));
        }
        if r.under_provisioned > 0 {
            lines.push(format!("  Under-provisioned: {}", r.under_provisioned));
        }
        lines.push(String::new());
    }

    let content = lines.join("\n");
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a sweep summary to stdout
pub fn print_sweep_summary(summary: &SweepSummary) {
    println!("\n=== SWEEP SUMMARY ===\n");
    println!("{:>7} {:>4} {:>6} {:>6} {:>9} {:>10} {:>7}", "n", "k", "max", "alive", "avg_dist", "disconn", "mincut");
    for entry in &summary.entries {
        let p = &entry.params;
        let r = &entry.results;
        println!(
            "{:>7} {:>4} {:>6} {:>6.2} {:>9.3} {:>10.6} {:>7}",
            p.size,
            p.k,
            p.max_degree,
            p.alive,
            r.avg_distance,
            r.disconnection_probability,
            r.min_cut.map_or_else(|| "-".to_string(), |c| c.to_string())
        );
    }
    println!();
}

/// Print an adaptive summary to stdout
pub fn print_adaptive_summary(summary: &AdaptiveSummary) {
    println!("\n=== ADAPTIVE SUMMARY ===\n");
    println!("Nodes: {}  k: {}  max degree: {}", summary.size, summary.k, summary.max_degree);
    if let Some(ping) = summary.average_ping {
        println!("Average ping: {ping:.1}");
    }
    if let Some(best) = summary.best_avg_distance {
        println!("Best average distance (full graph): {best:.1}");
    }
    for trial in &summary.trials {
        println!(
            "  trial {}: avg distance {:.1} -> {:.1}, {} unreachable, {} route kills ({})",
            trial.trial,
            trial.initial_avg_distance,
            trial.final_avg_distance,
            trial.final_unreachable,
            trial.total_route_kills,
            trial.csv_path
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::results::ResultsAccumulator;
    use crate::analysis::types::{ReportMetadata, RunMode, SweepParams};
    use tempfile::tempdir;

    #[test]
    fn test_round_writer_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/adaptive_0.csv");

        let mut writer = RoundWriter::create(&path, &[0.5], 3).unwrap();
        writer
            .write_round(&RoundRow {
                round: 0,
                avg_distance: 150.0,
                unreachable: 2,
                disconnection_probability: 0.25,
                route_kills: 4,
                unsaturated: 1,
                rebooted: 0,
                unavailability: &[0.125],
                degree_histogram: &[0, 1, 2, 0, 1, 1],
            })
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "round,avg_distance,unreachable,disconnection_probability,route_kills,unsaturated,rebooted,\
             unavailability_0.5,degree_0,degree_1,degree_2,degree_3,degree_over"
        );
        assert_eq!(lines[1], "0,150.0000,2,0.250000,4,1,0,0.125000,0,1,2,0,2");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_sweep_outputs() {
        let dir = tempdir().unwrap();
        let mut acc = ResultsAccumulator::new(2, 4);
        acc.add_degree_sample(2);
        acc.add_distance_sample(1);
        acc.record_min_cut(2);
        let summary = SweepSummary {
            metadata: ReportMetadata {
                mode: RunMode::Sweep,
                generated_at: "2026-01-01T00:00:00+00:00".to_string(),
                master_seed: 7,
                threads: 1,
                tasks: 1,
            },
            entries: vec![SweepEntry {
                params: SweepParams {
                    size: 10,
                    k: 2,
                    max_degree: 2,
                    alive: 1.0,
                },
                runs: 1,
                results: acc.finalize(),
            }],
        };

        let csv = dir.path().join("sweep.csv");
        write_sweep_csv(&summary.entries, &csv).unwrap();
        let content = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], SWEEP_HEADER.join(","));
        assert_eq!(lines[1], "10,2,2,1,1.0000,0.000000,1,2,0,1.0000");

        let json = dir.path().join("summary.json");
        generate_json_report(&summary, &json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["metadata"]["mode"], "sweep");
        assert_eq!(value["entries"][0]["results"]["min_cut"], 2);

        let text = dir.path().join("summary.txt");
        generate_text_report(&summary, &text).unwrap();
        assert!(fs::read_to_string(&text).unwrap().contains("Min cut:           2"));
    }

    #[test]
    fn test_bucketize_overflow() {
        assert_eq!(bucketize(&[1, 2], 3), vec![1, 2, 0, 0, 0]);
        assert_eq!(bucketize(&[0, 0, 0, 0, 0, 4], 2), vec![0, 0, 0, 4]);
    }
}
