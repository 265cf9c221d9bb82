//! Unconstrained random overlay construction.
//!
//! Nodes are processed in index order. Each draws uniformly random peers
//! until it holds `k` edges, skipping peers that are already neighbours or
//! saturated. Peers with a higher index (not yet processed) must keep
//! `degree_margin` slots free so that late nodes still find partners.

use log::{debug, info, warn};
use rand::Rng;

use super::types::{NodeId, OverlayGraph};

/// Default capacity reserved on not-yet-processed nodes
pub const DEFAULT_DEGREE_MARGIN: usize = 10;

/// Default number of random draws before a node is declared under-provisioned
pub const DEFAULT_BUILD_ATTEMPTS: usize = 300;

/// Degenerate construction parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("fan-out k must be positive")]
    ZeroFanout,

    #[error("fan-out k={k} exceeds max degree {max_degree}")]
    FanoutExceedsMaxDegree { k: usize, max_degree: usize },

    #[error("{size} nodes cannot give every node {k} distinct peers")]
    TooFewNodes { size: usize, k: usize },

    #[error("attempt cap must be positive")]
    ZeroAttempts,
}

/// Result of a construction run
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: OverlayGraph,
    /// Nodes left with fewer than `k` edges after exhausting their attempts
    pub under_provisioned: Vec<NodeId>,
}

/// Builder for unconstrained random overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomBuilder {
    k: usize,
    max_degree: usize,
    degree_margin: usize,
    max_attempts: usize,
}

impl RandomBuilder {
    pub fn new(k: usize, max_degree: usize) -> Result<Self, BuildError> {
        if k == 0 {
            return Err(BuildError::ZeroFanout);
        }
        if k > max_degree {
            return Err(BuildError::FanoutExceedsMaxDegree { k, max_degree });
        }
        Ok(Self {
            k,
            max_degree,
            degree_margin: DEFAULT_DEGREE_MARGIN,
            max_attempts: DEFAULT_BUILD_ATTEMPTS,
        })
    }

    pub fn with_degree_margin(mut self, degree_margin: usize) -> Self {
        self.degree_margin = degree_margin;
        self
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

    /// Build an overlay of `size` nodes.
    ///
    /// Fails only on degenerate parameters. A node that cannot find a valid
    /// peer within the attempt cap is left under-provisioned and reported.
    pub fn build<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<BuildOutcome, BuildError> {
        if size <= self.k {
            return Err(BuildError::TooFewNodes { size, k: self.k });
        }

        debug!(
            "Building random overlay: size={} k={} max_degree={} margin={}",
            size, self.k, self.max_degree, self.degree_margin
        );

        let mut graph = OverlayGraph::new(size);
        let mut under_provisioned = Vec::new();

        for i in 0..size {
            let node = NodeId::new(i);
            while graph.degree(node) < self.k {
                match self.draw_peer(&graph, node, rng) {
                    Some(peer) => {
                        graph.add_edge(node, peer);
                    }
                    None => {
                        debug!(
                            "Node {} stuck at degree {} after {} attempts",
                            node,
                            graph.degree(node),
                            self.max_attempts
                        );
                        under_provisioned.push(node);
                        break;
                    }
                }
            }
        }

        if !under_provisioned.is_empty() {
            warn!(
                "{} of {} nodes are under-provisioned (k={}, max_degree={})",
                under_provisioned.len(),
                size,
                self.k,
                self.max_degree
            );
        }
        info!("Built overlay with {} nodes and {} edges", size, graph.edge_count());

        Ok(BuildOutcome {
            graph,
            under_provisioned,
        })
    }

    fn draw_peer<R: Rng + ?Sized>(
        &self,
        graph: &OverlayGraph,
        node: NodeId,
        rng: &mut R,
    ) -> Option<NodeId> {
        let size = graph.size();
        (0..self.max_attempts)
            .map(|_| NodeId::new(rng.gen_range(0..size)))
            .find(|&peer| self.accepts(graph, node, peer))
    }

    fn accepts(&self, graph: &OverlayGraph, node: NodeId, peer: NodeId) -> bool {
        if peer == node || graph.contains_edge(node, peer) {
            return false;
        }
        let degree = graph.degree(peer);
        if degree >= self.max_degree {
            return false;
        }
        // Unprocessed peers keep room for their own k edges
        peer < node || degree <= self.max_degree.saturating_sub(self.degree_margin)
    }
}
