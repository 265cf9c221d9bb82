//! Dense symmetric latency matrix and dataset parser.
//!
//! Datasets are whitespace separated records `nodeA nodeB cost`, one per
//! line. Costs below the feasibility threshold are coerced to the sentinel.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel stored for links that cannot be formed.
pub const INFEASIBLE: i32 = -1;

/// Default threshold below which a measured cost is considered bogus.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Match: "<a> <b> <cost>" with optional surrounding whitespace
static RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+(\d+)\s+(-?\d+(?:\.\d*)?(?:[eE][-+]?\d+)?)\s*$")
        .expect("Invalid latency record regex")
});

/// Errors raised while loading or decoding a latency dataset
#[derive(Debug, thiserror::Error)]
pub enum LatencyError {
    #[error("Failed to read latency dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed latency record on line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("Node index {index} on line {line} is outside a matrix of size {size}")]
    OutOfRange { line: usize, index: usize, size: usize },

    #[error("Latency dataset contains no records")]
    Empty,

    #[error("Latency matrix size must be positive")]
    ZeroSize,

    #[error("Failed to decode latency cache: {0}")]
    Cache(String),
}

/// Numbering convention of a dataset's node identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBase {
    Zero,
    #[default]
    One,
}

impl IndexBase {
    fn offset(self) -> usize {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Immutable N×N matrix of link costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyMatrix {
    size: usize,
    values: Vec<i32>,
}

impl LatencyMatrix {
    /// A matrix where every link is infeasible.
    pub fn infeasible(size: usize) -> Self {
        Self {
            size,
            values: vec![INFEASIBLE; size * size],
        }
    }

    /// A matrix where every distinct pair is linked with the same cost.
    pub fn uniform(size: usize, cost: i32) -> Self {
        let mut matrix = Self::infeasible(size);
        for i in 0..size {
            for j in 0..size {
                if i != j {
                    matrix.values[i * size + j] = cost;
                }
            }
        }
        matrix
    }

    /// Build a symmetric matrix from zero-based `(a, b, cost)` records.
    ///
    /// Costs below `threshold` are stored as [`INFEASIBLE`].
    pub fn from_records(
        size: usize,
        records: impl IntoIterator<Item = (usize, usize, f64)>,
        threshold: f64,
    ) -> Result<Self, LatencyError> {
        if size == 0 {
            return Err(LatencyError::ZeroSize);
        }
        let mut matrix = Self::infeasible(size);
        for (line, (a, b, cost)) in records.into_iter().enumerate() {
            for index in [a, b] {
                if index >= size {
                    return Err(LatencyError::OutOfRange { line: line + 1, index, size });
                }
            }
            matrix.set(a, b, coerce(cost, threshold));
        }
        Ok(matrix)
    }

    /// Parse dataset text.
    pub fn parse(
        content: impl BufRead,
        size: usize,
        base: IndexBase,
        threshold: f64,
    ) -> Result<Self, LatencyError> {
        if size == 0 {
            return Err(LatencyError::ZeroSize);
        }

        let mut matrix = Self::infeasible(size);
        let mut records = 0usize;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| LatencyError::Io {
                path: "<stream>".to_string(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let caps = RECORD.captures(trimmed).ok_or_else(|| LatencyError::Malformed {
                line: line_no,
                content: trimmed.to_string(),
            })?;

            let index = |group: usize| -> Result<usize, LatencyError> {
                let raw: usize = caps[group].parse().map_err(|_| LatencyError::Malformed {
                    line: line_no,
                    content: trimmed.to_string(),
                })?;
                let shifted = raw.checked_sub(base.offset()).ok_or(LatencyError::OutOfRange {
                    line: line_no,
                    index: raw,
                    size,
                })?;
                if shifted >= size {
                    return Err(LatencyError::OutOfRange { line: line_no, index: raw, size });
                }
                Ok(shifted)
            };
            let a = index(1)?;
            let b = index(2)?;

            let cost: f64 = caps[3].parse().map_err(|_| LatencyError::Malformed {
                line: line_no,
                content: trimmed.to_string(),
            })?;

            matrix.set(a, b, coerce(cost, threshold));
            records += 1;
        }

        if records == 0 {
            return Err(LatencyError::Empty);
        }

        log::debug!("Parsed {} latency records for {} nodes", records, size);
        Ok(matrix)
    }

    /// Load a dataset from disk.
    pub fn load(
        path: &Path,
        size: usize,
        base: IndexBase,
        threshold: f64,
    ) -> Result<Self, LatencyError> {
        log::info!("Loading latency dataset from {}", path.display());
        let file = File::open(path).map_err(|source| LatencyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let matrix = Self::parse(BufReader::new(file), size, base, threshold)?;
        log::info!(
            "Loaded {}x{} latency matrix, {} feasible links, average ping {:.1}",
            size,
            size,
            matrix.feasible_pairs(),
            matrix.average_ping()
        );
        Ok(matrix)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Reject a matrix whose storage does not hold `size * size` values,
    /// as can happen with one decoded from an untrusted cache.
    pub fn check_shape(&self) -> Result<(), LatencyError> {
        if self.size == 0 {
            return Err(LatencyError::ZeroSize);
        }
        let expected = self.size.checked_mul(self.size);
        if expected != Some(self.values.len()) {
            return Err(LatencyError::Cache(format!(
                "matrix declares {} nodes but holds {} values",
                self.size,
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Raw cost, [`INFEASIBLE`] when no link may form.
    #[inline]
    pub fn get(&self, a: usize, b: usize) -> i32 {
        self.values[a * self.size + b]
    }

    #[inline]
    pub fn is_feasible(&self, a: usize, b: usize) -> bool {
        a != b && self.get(a, b) > 0
    }

    fn set(&mut self, a: usize, b: usize, cost: i32) {
        self.values[a * self.size + b] = cost;
        self.values[b * self.size + a] = cost;
    }

    /// Number of unordered feasible pairs.
    pub fn feasible_pairs(&self) -> usize {
        (0..self.size)
            .map(|i| ((i + 1)..self.size).filter(|&j| self.is_feasible(i, j)).count())
            .sum()
    }

    /// Mean cost over all feasible links, 0 when none exist.
    pub fn average_ping(&self) -> f64 {
        let mut total = 0f64;
        let mut count = 0usize;
        for i in 0..self.size {
            for j in 0..self.size {
                if self.is_feasible(i, j) {
                    total += self.get(i, j) as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    /// Mean shortest latency between distinct node pairs when every feasible
    /// link is present, the best any overlay over this matrix can achieve.
    /// Unreachable pairs are left out; `None` when no pair is connected.
    pub fn average_shortest_distance(&self) -> Option<f64> {
        let (total, pairs) = (0..self.size)
            .into_par_iter()
            .map(|source| {
                self.shortest_distances_from(source)
                    .into_iter()
                    .enumerate()
                    .filter(|&(target, _)| target != source)
                    .filter_map(|(_, distance)| distance)
                    .fold((0u64, 0usize), |(sum, n), d| (sum + d, n + 1))
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        (pairs > 0).then(|| total as f64 / pairs as f64)
    }

    /// Dense Dijkstra over every feasible link.
    fn shortest_distances_from(&self, source: usize) -> Vec<Option<u64>> {
        let mut distances: Vec<Option<u64>> = vec![None; self.size];
        let mut settled = vec![false; self.size];
        distances[source] = Some(0);

        loop {
            let next = (0..self.size)
                .filter(|&i| !settled[i])
                .filter_map(|i| distances[i].map(|d| (d, i)))
                .min();
            let Some((distance, node)) = next else {
                break;
            };
            settled[node] = true;

            for peer in 0..self.size {
                if settled[peer] || !self.is_feasible(node, peer) {
                    continue;
                }
                let candidate = distance + self.get(node, peer) as u64;
                if distances[peer].map_or(true, |current| candidate < current) {
                    distances[peer] = Some(candidate);
                }
            }
        }
        distances
    }

    /// Number of feasible peers for every node.
    pub fn reachable_counts(&self) -> Vec<usize> {
        (0..self.size)
            .map(|i| (0..self.size).filter(|&j| self.is_feasible(i, j)).count())
            .collect()
    }

    /// Drop nodes with at most `min_reachable` feasible peers and renumber
    /// the survivors densely, preserving their relative order.
    pub fn compact(&self, min_reachable: usize) -> Self {
        let kept: Vec<usize> = self
            .reachable_counts()
            .into_iter()
            .enumerate()
            .filter(|&(_, count)| count > min_reachable)
            .map(|(i, _)| i)
            .collect();

        let size = kept.len();
        let mut compacted = Self::infeasible(size);
        for (new_a, &old_a) in kept.iter().enumerate() {
            for (new_b, &old_b) in kept.iter().enumerate() {
                compacted.values[new_a * size + new_b] = self.get(old_a, old_b);
            }
        }

        log::info!(
            "Compacted latency matrix from {} to {} nodes (min reachable {})",
            self.size,
            size,
            min_reachable
        );
        compacted
    }

    /// Write every unordered pair as a zero-based `a b cost` record.
    pub fn write_records(&self, mut out: impl Write) -> std::io::Result<()> {
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                writeln!(out, "{} {} {}", i, j, self.get(i, j))?;
            }
        }
        out.flush()
    }
}

fn coerce(cost: f64, threshold: f64) -> i32 {
    if cost < threshold || !cost.is_finite() {
        INFEASIBLE
    } else {
        cost.round().min(i32::MAX as f64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_based_symmetric() {
        let data = "1 2 150\n2 3 120.4\n# comment\n\n1 3 20\n";
        let matrix = LatencyMatrix::parse(data.as_bytes(), 3, IndexBase::One, 100.0).unwrap();

        assert_eq!(matrix.get(0, 1), 150);
        assert_eq!(matrix.get(1, 0), 150);
        assert_eq!(matrix.get(1, 2), 120);
        // below threshold
        assert_eq!(matrix.get(0, 2), INFEASIBLE);
        assert!(!matrix.is_feasible(0, 2));
        assert!(!matrix.is_feasible(1, 1));
    }

    #[test]
    fn test_parse_zero_based() {
        let data = "0 1 300\n";
        let matrix = LatencyMatrix::parse(data.as_bytes(), 2, IndexBase::Zero, 100.0).unwrap();
        assert!(matrix.is_feasible(0, 1));
        assert_eq!(matrix.feasible_pairs(), 1);
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let data = "1 5 300\n";
        let err = LatencyMatrix::parse(data.as_bytes(), 3, IndexBase::One, 100.0).unwrap_err();
        assert!(matches!(err, LatencyError::OutOfRange { line: 1, index: 5, .. }));

        let err = LatencyMatrix::parse("0 1 300\n".as_bytes(), 3, IndexBase::One, 100.0)
            .unwrap_err();
        assert!(matches!(err, LatencyError::OutOfRange { index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty() {
        let err = LatencyMatrix::parse("1 two 3\n".as_bytes(), 3, IndexBase::One, 100.0)
            .unwrap_err();
        assert!(matches!(err, LatencyError::Malformed { line: 1, .. }));

        let err = LatencyMatrix::parse("\n# nothing\n".as_bytes(), 3, IndexBase::One, 100.0)
            .unwrap_err();
        assert!(matches!(err, LatencyError::Empty));
    }

    #[test]
    fn test_average_ping_and_compact() {
        let records = vec![(0, 1, 200.0), (1, 2, 400.0), (0, 3, 50.0)];
        let matrix = LatencyMatrix::from_records(4, records, 100.0).unwrap();

        assert_eq!(matrix.reachable_counts(), vec![1, 2, 1, 0]);
        assert!((matrix.average_ping() - 300.0).abs() < 1e-9);

        // Node 3 has no feasible peers and disappears
        let compacted = matrix.compact(0);
        assert_eq!(compacted.size(), 3);
        assert_eq!(compacted.get(1, 2), 400);

        let mut out = Vec::new();
        compacted.write_records(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("0 1 200"));
        assert!(text.contains("0 2 -1"));
    }

    #[test]
    fn test_average_shortest_distance_uses_detours() {
        // Direct 0-2 is 500 but 0-1-2 costs 300; node 3 is isolated
        let records = vec![(0, 1, 100.0), (1, 2, 200.0), (0, 2, 500.0)];
        let matrix = LatencyMatrix::from_records(4, records, 50.0).unwrap();

        // Ordered pairs: 0-1 100, 1-2 200, 0-2 300, each counted twice
        let avg = matrix.average_shortest_distance().unwrap();
        assert!((avg - 200.0).abs() < 1e-9);
        assert!(avg < matrix.average_ping());

        assert_eq!(LatencyMatrix::infeasible(3).average_shortest_distance(), None);
    }

    #[test]
    fn test_check_shape() {
        assert!(LatencyMatrix::uniform(3, 150).check_shape().is_ok());

        let short: LatencyMatrix =
            serde_json::from_str(r#"{"size": 3, "values": [150, 150]}"#).unwrap();
        assert!(matches!(short.check_shape(), Err(LatencyError::Cache(_))));
    }
}
