//! Latency-constrained overlay construction.
//!
//! Edges may only form where the latency matrix holds a feasible cost. Each
//! node tops up its own generated edges to `k`; targets accept an edge while
//! their combined load (all neighbours plus their own generated edges) stays
//! within `max_degree + k`.

use log::{debug, info, warn};
use rand::Rng;

use super::builder::BuildError;
use super::types::{NodeId, OverlayGraph};
use crate::latency::LatencyMatrix;

/// Default number of random draws per edge search
pub const DEFAULT_SATURATION_ATTEMPTS: usize = 50;

/// Result of building a latency-constrained overlay
#[derive(Debug, Clone)]
pub struct SaturatedBuild {
    pub graph: OverlayGraph,
    /// Nodes whose generated edge count stayed below `k`
    pub unsaturated: Vec<NodeId>,
}

/// Adds and retracts generated edges under a latency matrix
#[derive(Debug, Clone, Copy)]
pub struct Saturator<'a> {
    latency: &'a LatencyMatrix,
    k: usize,
    max_degree: usize,
    max_attempts: usize,
}

impl<'a> Saturator<'a> {
    pub fn new(latency: &'a LatencyMatrix, k: usize, max_degree: usize) -> Result<Self, BuildError> {
        if k == 0 {
            return Err(BuildError::ZeroFanout);
        }
        if k > max_degree {
            return Err(BuildError::FanoutExceedsMaxDegree { k, max_degree });
        }
        Ok(Self {
            latency,
            k,
            max_degree,
            max_attempts: DEFAULT_SATURATION_ATTEMPTS,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Result<Self, BuildError> {
        if max_attempts == 0 {
            return Err(BuildError::ZeroAttempts);
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn latency(&self) -> &'a LatencyMatrix {
        self.latency
    }

    /// Build a fresh overlay over every node of the latency matrix.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SaturatedBuild, BuildError> {
        let size = self.latency.size();
        if size <= self.k {
            return Err(BuildError::TooFewNodes { size, k: self.k });
        }

        let mut graph = OverlayGraph::new(size);
        let mut unsaturated = Vec::new();
        for node in 0..size {
            let node = NodeId::new(node);
            if !self.saturate_node(&mut graph, node, rng) {
                unsaturated.push(node);
            }
        }

        if !unsaturated.is_empty() {
            warn!("{} of {} nodes could not be saturated", unsaturated.len(), size);
        }
        info!(
            "Built latency-constrained overlay with {} nodes and {} edges",
            size,
            graph.edge_count()
        );
        Ok(SaturatedBuild { graph, unsaturated })
    }

    /// Top `node`'s generated edges up to `k`.
    ///
    /// Returns false when an edge search ran out of attempts; the node is
    /// left under-saturated, which is not an error.
    pub fn saturate_node<R: Rng + ?Sized>(
        &self,
        graph: &mut OverlayGraph,
        node: NodeId,
        rng: &mut R,
    ) -> bool {
        while graph.generated(node).len() < self.k {
            if self.add_edge(graph, node, rng).is_none() {
                debug!(
                    "Node {} saturated at {}/{} generated edges",
                    node,
                    graph.generated(node).len(),
                    self.k
                );
                return false;
            }
        }
        true
    }

    /// One bounded search for a new generated edge from `from`.
    pub fn add_edge<R: Rng + ?Sized>(
        &self,
        graph: &mut OverlayGraph,
        from: NodeId,
        rng: &mut R,
    ) -> Option<NodeId> {
        let size = graph.size();
        for _ in 0..self.max_attempts {
            let to = NodeId::new(rng.gen_range(0..size));
            if self.accepts(graph, from, to) {
                graph.add_generated_edge(from, to);
                return Some(to);
            }
        }
        None
    }

    /// Retract a generated edge.
    pub fn remove_edge(&self, graph: &mut OverlayGraph, from: NodeId, to: NodeId) -> bool {
        graph.remove_edge(from, to)
    }

    fn accepts(&self, graph: &OverlayGraph, from: NodeId, to: NodeId) -> bool {
        from != to
            && self.latency.is_feasible(from.index(), to.index())
            && !graph.contains_edge(from, to)
            && graph.degree(to) + graph.generated(to).len() < self.max_degree + self.k
    }
}
