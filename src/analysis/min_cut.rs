//! Randomized minimum-cut estimation by edge contraction.
//!
//! Each trial copies the overlay into a [`ContractionGraph`] and contracts
//! random live edges along a branching tree: contract to roughly `n/√2`
//! super-nodes, split into two independent copies, and continue on each
//! until two super-nodes remain. The edges left between them form a real cut
//! of the original graph, so the estimate never undershoots the true minimum
//! cut; it may overshoot when every branch of every trial contracted a
//! minimum-cut edge. More trials only shrink the chance of overshooting.

use std::f64::consts::SQRT_2;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::topology::OverlayGraph;

/// Working copy used by a single contraction run.
///
/// Merged-away nodes and self-loop edges become `None` slots and are skipped
/// until [`ContractionGraph::compact`] renumbers the survivors. A live edge's
/// id appears in exactly the incidence lists of its two live endpoints.
#[derive(Debug, Clone)]
pub struct ContractionGraph {
    nodes: Vec<Option<Vec<usize>>>,
    edges: Vec<Option<(usize, usize)>>,
    live_nodes: usize,
    live_edges: usize,
}

impl ContractionGraph {
    pub fn from_overlay(graph: &OverlayGraph) -> Self {
        let mut nodes: Vec<Option<Vec<usize>>> = vec![Some(Vec::new()); graph.size()];
        let mut edges = Vec::with_capacity(graph.edge_count());

        for a in graph.nodes() {
            for &b in graph.neighbors(a).iter().filter(|&&b| a < b) {
                let id = edges.len();
                edges.push(Some((a.index(), b.index())));
                for endpoint in [a.index(), b.index()] {
                    if let Some(incident) = nodes[endpoint].as_mut() {
                        incident.push(id);
                    }
                }
            }
        }

        let live_edges = edges.len();
        Self {
            live_nodes: nodes.len(),
            nodes,
            edges,
            live_edges,
        }
    }

    pub fn live_nodes(&self) -> usize {
        self.live_nodes
    }

    pub fn live_edges(&self) -> usize {
        self.live_edges
    }

    /// Edges crossing between the remaining super-nodes once contraction
    /// has reached two of them.
    pub fn cut_value(&self) -> usize {
        if self.live_nodes < 2 {
            0
        } else {
            self.live_edges
        }
    }

    /// Contract random live edges until `target` super-nodes remain.
    ///
    /// Returns false if the live edges ran out first, meaning the remaining
    /// super-nodes are disconnected from each other.
    pub fn contract_to<R: Rng + ?Sized>(&mut self, target: usize, rng: &mut R) -> bool {
        while self.live_nodes > target {
            if self.live_edges * 2 < self.edges.len() {
                self.compact();
            }
            match self.random_live_edge(rng) {
                Some(edge) => self.fuse(edge),
                None => return false,
            }
        }
        true
    }

    fn random_live_edge<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.live_edges == 0 {
            return None;
        }
        // At least half the slots are live after compaction
        loop {
            let id = rng.gen_range(0..self.edges.len());
            if self.edges[id].is_some() {
                return Some(id);
            }
        }
    }

    /// Merge the second endpoint of `edge` into the first.
    fn fuse(&mut self, edge: usize) {
        let Some((survivor, absorbed)) = self.edges[edge] else {
            return;
        };
        let Some(moved) = self.nodes[absorbed].take() else {
            return;
        };

        for id in moved {
            let Some((a, b)) = self.edges[id] else {
                continue;
            };
            let other = if a == absorbed { b } else { a };
            if other == survivor {
                self.edges[id] = None;
                self.live_edges -= 1;
            } else {
                self.edges[id] = Some((survivor, other));
                if let Some(incident) = self.nodes[survivor].as_mut() {
                    incident.push(id);
                }
            }
        }

        let edges = &self.edges;
        if let Some(incident) = self.nodes[survivor].as_mut() {
            incident.retain(|&id| edges[id].is_some());
        }
        self.live_nodes -= 1;
    }

    /// Drop tombstoned slots and renumber live nodes and edges densely.
    pub fn compact(&mut self) {
        let mut node_map = vec![usize::MAX; self.nodes.len()];
        let mut next = 0;
        for (old, slot) in self.nodes.iter().enumerate() {
            if slot.is_some() {
                node_map[old] = next;
                next += 1;
            }
        }

        let mut edge_map = vec![usize::MAX; self.edges.len()];
        let mut edges = Vec::with_capacity(self.live_edges);
        for (old, slot) in self.edges.iter().enumerate() {
            if let Some((a, b)) = *slot {
                edge_map[old] = edges.len();
                edges.push(Some((node_map[a], node_map[b])));
            }
        }

        let nodes: Vec<Option<Vec<usize>>> = self
            .nodes
            .iter()
            .flatten()
            .map(|incident| {
                Some(
                    incident
                        .iter()
                        .map(|&id| edge_map[id])
                        .filter(|&id| id != usize::MAX)
                        .collect(),
                )
            })
            .collect();

        self.nodes = nodes;
        self.edges = edges;
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let live_nodes = self.nodes.iter().filter(|n| n.is_some()).count();
        let live_edges = self.edges.iter().filter(|e| e.is_some()).count();
        if live_nodes != self.live_nodes || live_edges != self.live_edges {
            return false;
        }
        self.edges.iter().enumerate().all(|(id, slot)| match slot {
            None => self
                .nodes
                .iter()
                .flatten()
                .all(|incident| !incident.contains(&id)),
            Some((a, b)) => self.nodes.iter().enumerate().all(|(n, incident)| {
                let listed = incident.as_ref().map_or(0, |inc| inc.iter().filter(|&&e| e == id).count());
                let expected = usize::from(n == *a || n == *b);
                a != b && listed == expected
            }),
        })
    }
}

/// Outcome of a min-cut estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinCutEstimate {
    /// Smallest cut found across all trials
    pub value: usize,
    pub trials: usize,
    /// Some branch was finished without further splitting because the depth
    /// or time budget ran out
    pub budget_exhausted: bool,
}

/// Karger-Stein style estimator with optional work budgets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinCutEstimator {
    trials: Option<usize>,
    max_depth: Option<usize>,
    time_budget: Option<Duration>,
}

impl MinCutEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default `⌈ln n⌉` trial count.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = Some(trials.max(1));
        self
    }

    /// Stop branching below this depth; deeper work contracts straight to two.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Stop branching once this much wall time has elapsed.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// `⌈ln size⌉`, at least one.
    pub fn default_trials(size: usize) -> usize {
        if size < 3 {
            1
        } else {
            ((size as f64).ln().ceil() as usize).max(1)
        }
    }

    pub fn estimate<R: Rng + ?Sized>(&self, graph: &OverlayGraph, rng: &mut R) -> MinCutEstimate {
        if graph.size() < 2 {
            return MinCutEstimate {
                value: 0,
                trials: 0,
                budget_exhausted: false,
            };
        }

        let trials = self.trials.unwrap_or_else(|| Self::default_trials(graph.size()));
        let deadline = self.time_budget.map(|budget| Instant::now() + budget);
        let base = ContractionGraph::from_overlay(graph);

        let mut best = usize::MAX;
        let mut budget_exhausted = false;
        for trial in 0..trials {
            let (value, exhausted) = self.run_trial(&base, rng, deadline);
            debug!("Min-cut trial {}/{}: {}", trial + 1, trials, value);
            best = best.min(value);
            budget_exhausted |= exhausted;
            if best == 0 {
                break;
            }
        }

        MinCutEstimate {
            value: best,
            trials,
            budget_exhausted,
        }
    }

    fn run_trial<R: Rng + ?Sized>(
        &self,
        base: &ContractionGraph,
        rng: &mut R,
        deadline: Option<Instant>,
    ) -> (usize, bool) {
        let mut best = usize::MAX;
        let mut exhausted = false;
        let mut stack = vec![(base.clone(), 0usize)];

        while let Some((mut graph, depth)) = stack.pop() {
            let n = graph.live_nodes();
            if n <= 2 {
                best = best.min(graph.cut_value());
                continue;
            }

            let over_budget = self.max_depth.is_some_and(|max| depth >= max)
                || deadline.is_some_and(|d| Instant::now() >= d);
            if over_budget {
                exhausted = true;
                let value = if graph.contract_to(2, rng) { graph.cut_value() } else { 0 };
                best = best.min(value);
                continue;
            }

            if !graph.contract_to(branch_target(n), rng) {
                return (0, exhausted);
            }
            stack.push((graph.clone(), depth + 1));
            stack.push((graph, depth + 1));
        }

        (best, exhausted)
    }
}

/// Super-node count after one branching level.
fn branch_target(n: usize) -> usize {
    let scaled = (n as f64 / SQRT_2).floor() as usize;
    scaled.min(n.saturating_sub(2)).max(2)
}
