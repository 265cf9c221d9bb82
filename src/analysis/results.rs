//! Streaming aggregation of per-run samples.
//!
//! Counters are raw until [`ResultsAccumulator::finalize`], which consumes the
//! accumulator and normalises every bucket exactly once.

use serde::{Deserialize, Serialize};

use super::reachability::UNREACHABLE;
use crate::topology::{NodeId, OverlayGraph};

/// Raw counters for one parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsAccumulator {
    max_degree: usize,
    max_distance: usize,
    degree_counts: Vec<u64>,
    distance_counts: Vec<u64>,
    degree_samples: u64,
    distance_samples: u64,
    degree_overflow: u64,
    distance_overflow: u64,
    disconnected: u64,
    distance_total: u64,
    max_distance_reached: Option<u32>,
    under_provisioned: u64,
    min_cuts: Vec<usize>,
}

impl ResultsAccumulator {
    pub fn new(max_degree: usize, max_distance: usize) -> Self {
        Self {
            max_degree,
            max_distance,
            degree_counts: vec![0; max_degree + 1],
            distance_counts: vec![0; max_distance + 1],
            degree_samples: 0,
            distance_samples: 0,
            degree_overflow: 0,
            distance_overflow: 0,
            disconnected: 0,
            distance_total: 0,
            max_distance_reached: None,
            under_provisioned: 0,
            min_cuts: Vec::new(),
        }
    }

    pub fn add_degree_sample(&mut self, degree: usize) {
        match self.degree_counts.get_mut(degree) {
            Some(bucket) => *bucket += 1,
            None => self.degree_overflow += 1,
        }
        self.degree_samples += 1;
    }

    /// Record one hop distance; [`UNREACHABLE`] counts as a disconnection.
    pub fn add_distance_sample(&mut self, distance: i32) {
        self.distance_samples += 1;
        if distance < 0 {
            self.disconnected += 1;
            return;
        }

        let distance = distance as u32;
        self.distance_total += u64::from(distance);
        match self.distance_counts.get_mut(distance as usize) {
            Some(bucket) => *bucket += 1,
            None => self.distance_overflow += 1,
        }
        self.max_distance_reached = Some(self.max_distance_reached.map_or(distance, |m| m.max(distance)));
    }

    /// One degree sample per node.
    pub fn update_degrees(&mut self, graph: &OverlayGraph) {
        for node in graph.nodes() {
            self.add_degree_sample(graph.degree(node));
        }
    }

    /// Fold a distance vector from [`distances_from`](super::reachability::distances_from),
    /// skipping the source's own zero entry.
    pub fn update_distances(&mut self, distances: &[i32], source: NodeId) {
        for (index, &distance) in distances.iter().enumerate() {
            if index != source.index() {
                self.add_distance_sample(distance);
            }
        }
    }

    pub fn record_under_provisioned(&mut self, count: usize) {
        self.under_provisioned += count as u64;
    }

    pub fn record_min_cut(&mut self, value: usize) {
        self.min_cuts.push(value);
    }

    /// Add another accumulator's raw counters. Both must share bucket ranges.
    pub fn merge(&mut self, other: &ResultsAccumulator) {
        debug_assert_eq!(self.max_degree, other.max_degree);
        debug_assert_eq!(self.max_distance, other.max_distance);

        for (mine, theirs) in self.degree_counts.iter_mut().zip(&other.degree_counts) {
            *mine += theirs;
        }
        for (mine, theirs) in self.distance_counts.iter_mut().zip(&other.distance_counts) {
            *mine += theirs;
        }
        self.degree_samples += other.degree_samples;
        self.distance_samples += other.distance_samples;
        self.degree_overflow += other.degree_overflow;
        self.distance_overflow += other.distance_overflow;
        self.disconnected += other.disconnected;
        self.distance_total += other.distance_total;
        self.max_distance_reached = match (self.max_distance_reached, other.max_distance_reached) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.under_provisioned += other.under_provisioned;
        self.min_cuts.extend_from_slice(&other.min_cuts);
    }

    pub fn finalize(self) -> Results {
        let degree_samples = self.degree_samples.max(1) as f64;
        let distance_samples = self.distance_samples.max(1) as f64;
        let reachable = self.distance_samples - self.disconnected;

        Results {
            degree_distribution: self.degree_counts.iter().map(|&c| c as f64 / degree_samples).collect(),
            distance_distribution: self.distance_counts.iter().map(|&c| c as f64 / distance_samples).collect(),
            degree_overflow: self.degree_overflow as f64 / degree_samples,
            distance_overflow: self.distance_overflow as f64 / distance_samples,
            disconnection_probability: self.disconnected as f64 / distance_samples,
            avg_distance: if reachable == 0 {
                0.0
            } else {
                self.distance_total as f64 / reachable as f64
            },
            max_distance_reached: self.max_distance_reached.map_or(UNREACHABLE, |d| d as i32),
            degree_samples: self.degree_samples,
            distance_samples: self.distance_samples,
            disconnected: self.disconnected,
            under_provisioned: self.under_provisioned,
            min_cut: self.min_cuts.iter().copied().min(),
            avg_min_cut: (!self.min_cuts.is_empty())
                .then(|| self.min_cuts.iter().sum::<usize>() as f64 / self.min_cuts.len() as f64),
        }
    }
}

/// Normalised distributions and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// Probability mass per degree, `0..=max_degree`
    pub degree_distribution: Vec<f64>,
    /// Probability mass per hop distance, `0..=max_distance`, over all samples
    /// including disconnected ones
    pub distance_distribution: Vec<f64>,
    pub degree_overflow: f64,
    pub distance_overflow: f64,
    pub disconnection_probability: f64,
    /// Mean hop distance over reachable pairs
    pub avg_distance: f64,
    /// Largest finite distance seen, `-1` if none
    pub max_distance_reached: i32,
    pub degree_samples: u64,
    pub distance_samples: u64,
    pub disconnected: u64,
    pub under_provisioned: u64,
    pub min_cut: Option<usize>,
    pub avg_min_cut: Option<f64>,
}

impl Results {
    /// Share of nodes sitting exactly at `max_degree`.
    pub fn degree_at_max(&self) -> f64 {
        self.degree_distribution.last().copied().unwrap_or(0.0)
    }
}
