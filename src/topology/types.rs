//! Overlay graph representation.
//!
//! Nodes are dense indices into per-node containers; there is no per-node
//! object. Neighbour sets are ordered so that iteration, and therefore every
//! randomized decision made while walking them, is reproducible.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense index of a node in an [`OverlayGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize);
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Undirected overlay with per-node edge ownership.
///
/// `adjacency[i]` is symmetric. `generated[i]` is the subset of
/// `adjacency[i]` that node `i` initiated; only the initiator retracts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayGraph {
    adjacency: Vec<BTreeSet<NodeId>>,
    generated: Vec<BTreeSet<NodeId>>,
}

impl OverlayGraph {
    /// Graph of `size` isolated nodes.
    pub fn new(size: usize) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); size],
            generated: vec![BTreeSet::new(); size],
        }
    }

    /// Hand-built graph. Each pair is recorded as generated by its first
    /// endpoint; duplicates and self-loops are ignored.
    pub fn from_edges(size: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = Self::new(size);
        for &(from, to) in edges {
            graph.add_generated_edge(NodeId::new(from), NodeId::new(to));
        }
        graph
    }

    /// Cycle `0-1-..-(size-1)-0`.
    pub fn ring(size: usize) -> Self {
        let edges: Vec<(usize, usize)> = (0..size).map(|i| (i, (i + 1) % size)).collect();
        Self::from_edges(size, &edges)
    }

    /// Every pair connected.
    pub fn complete(size: usize) -> Self {
        let edges: Vec<(usize, usize)> = (0..size)
            .flat_map(|i| ((i + 1)..size).map(move |j| (i, j)))
            .collect();
        Self::from_edges(size, &edges)
    }

    /// Current live node count.
    #[inline]
    pub fn size(&self) -> usize {
        self.adjacency.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.size()).map(NodeId::new)
    }

    #[inline]
    pub fn neighbors(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.adjacency[node.index()]
    }

    /// Edges `node` initiated itself.
    #[inline]
    pub fn generated(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.generated[node.index()]
    }

    #[inline]
    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node.index()].len()
    }

    pub fn contains_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency[a.index()].contains(&b)
    }

    /// Add an undirected edge owned by neither endpoint. Returns false for
    /// self-loops and existing edges.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b || self.contains_edge(a, b) {
            return false;
        }
        self.adjacency[a.index()].insert(b);
        self.adjacency[b.index()].insert(a);
        true
    }

    /// Add an undirected edge initiated by `from`.
    pub fn add_generated_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if !self.add_edge(from, to) {
            return false;
        }
        self.generated[from.index()].insert(to);
        true
    }

    /// Remove the edge symmetrically and drop it from `generated[from]`.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        self.generated[from.index()].remove(&to);
        let removed = self.adjacency[from.index()].remove(&to);
        self.adjacency[to.index()].remove(&from);
        removed
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn max_degree(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).max().unwrap_or(0)
    }

    /// `histogram[d]` = number of nodes of degree `d`.
    pub fn degree_histogram(&self) -> Vec<usize> {
        let mut histogram = vec![0usize; self.max_degree() + 1];
        for neighbors in &self.adjacency {
            histogram[neighbors.len()] += 1;
        }
        histogram
    }

    /// Every adjacency entry is mirrored, in range, and generated sets are
    /// subsets of adjacency.
    pub fn is_symmetric(&self) -> bool {
        let size = self.size();
        self.nodes().all(|a| {
            let neighbors = self.neighbors(a);
            !neighbors.contains(&a)
                && neighbors
                    .iter()
                    .all(|&b| b.index() < size && self.adjacency[b.index()].contains(&a))
                && self.generated(a).is_subset(neighbors)
        })
    }

    /// Drop every node with index `>= size` and every reference to it.
    pub(crate) fn truncate(&mut self, size: usize) {
        let cutoff = NodeId::new(size);
        self.adjacency.truncate(size);
        self.generated.truncate(size);
        for set in self.adjacency.iter_mut().chain(self.generated.iter_mut()) {
            // split_off keeps everything >= cutoff in the returned set
            let _ = set.split_off(&cutoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_symmetric_and_owned() {
        let mut graph = OverlayGraph::new(3);
        assert!(graph.add_generated_edge(NodeId::new(0), NodeId::new(1)));
        assert!(!graph.add_generated_edge(NodeId::new(1), NodeId::new(0)));
        assert!(!graph.add_edge(NodeId::new(2), NodeId::new(2)));

        assert!(graph.contains_edge(NodeId::new(1), NodeId::new(0)));
        assert!(graph.generated(NodeId::new(0)).contains(&NodeId::new(1)));
        assert!(graph.generated(NodeId::new(1)).is_empty());
        assert!(graph.is_symmetric());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = OverlayGraph::ring(4);
        assert!(graph.remove_edge(NodeId::new(0), NodeId::new(1)));
        assert!(!graph.contains_edge(NodeId::new(1), NodeId::new(0)));
        assert!(graph.generated(NodeId::new(0)).is_empty());
        assert!(!graph.remove_edge(NodeId::new(0), NodeId::new(1)));
        assert!(graph.is_symmetric());
    }

    #[test]
    fn test_complete_and_histogram() {
        let graph = OverlayGraph::complete(5);
        assert_eq!(graph.edge_count(), 10);
        assert_eq!(graph.degree_histogram(), vec![0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_truncate_removes_dangling_references() {
        let mut graph = OverlayGraph::complete(6);
        graph.truncate(4);
        assert_eq!(graph.size(), 4);
        assert!(graph.is_symmetric());
        for node in graph.nodes() {
            assert_eq!(graph.degree(node), 3);
            assert!(graph.neighbors(node).iter().all(|n| n.index() < 4));
        }
    }
}
