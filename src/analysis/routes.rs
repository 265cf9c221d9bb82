//! Latency-weighted shortest paths and adaptive edge replacement.
//!
//! A round computes shortest-path trees from every node, counts how many
//! destinations route through each neighbour, and then lets every node
//! replace its least used generated edges with fresh random ones. All
//! decisions of a round are taken from the pre-round graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::latency::LatencyMatrix;
use crate::topology::{NodeId, OverlayGraph, Saturator};

/// Shortest-path tree rooted at one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSample {
    pub source: NodeId,
    /// Latency distance, `None` when unreachable
    pub distances: Vec<Option<u64>>,
    /// Hop count along the chosen shortest-latency path
    pub hops: Vec<Option<u32>>,
    pub predecessors: Vec<Option<NodeId>>,
    /// Destinations whose path from `source` traverses the node, not
    /// counting the node itself. Always 0 for `source`: the root of the
    /// tree is never a relay.
    pub route_counts: Vec<u64>,
    /// Nodes reached, excluding the source
    pub reachable: usize,
}

impl RouteSample {
    pub fn unreachable(&self) -> usize {
        self.distances.len() - self.reachable - 1
    }

    /// Sum of latency distances to every reached node.
    pub fn distance_total(&self) -> u64 {
        self.distances.iter().flatten().sum()
    }

    pub fn average_distance(&self) -> Option<f64> {
        (self.reachable > 0).then(|| self.distance_total() as f64 / self.reachable as f64)
    }

    #[inline]
    pub fn route_count(&self, node: NodeId) -> u64 {
        self.route_counts[node.index()]
    }
}

/// Dijkstra from `from` over latency-weighted edges, followed by a reverse
/// sweep that credits every node's subtree size to its predecessor, except
/// when that predecessor is `from` itself.
///
/// Ties between equal tentative distances are settled in insertion order.
/// Edges whose latency is infeasible are not traversed.
pub fn compute_routes(graph: &OverlayGraph, latency: &LatencyMatrix, from: NodeId) -> RouteSample {
    let size = graph.size();
    let mut distances: Vec<Option<u64>> = vec![None; size];
    let mut hops: Vec<Option<u32>> = vec![None; size];
    let mut predecessors: Vec<Option<NodeId>> = vec![None; size];
    let mut settled = vec![false; size];
    let mut order = Vec::with_capacity(size);

    distances[from.index()] = Some(0);
    hops[from.index()] = Some(0);

    let mut sequence = 0u64;
    let mut queue = BinaryHeap::new();
    queue.push(Reverse((0u64, sequence, from)));

    while let Some(Reverse((distance, _, node))) = queue.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;
        order.push(node);

        let next_hops = hops[node.index()].map_or(0, |h| h + 1);
        for &neighbor in graph.neighbors(node) {
            let cost = latency.get(node.index(), neighbor.index());
            if cost <= 0 || settled[neighbor.index()] {
                continue;
            }
            let candidate = distance + cost as u64;
            if distances[neighbor.index()].map_or(true, |current| candidate < current) {
                distances[neighbor.index()] = Some(candidate);
                hops[neighbor.index()] = Some(next_hops);
                predecessors[neighbor.index()] = Some(node);
                sequence += 1;
                queue.push(Reverse((candidate, sequence, neighbor)));
            }
        }
    }

    let mut route_counts = vec![0u64; size];
    for &node in order.iter().rev() {
        match predecessors[node.index()] {
            // Subtrees hanging off the source are not credited to it
            Some(prev) if prev != from => {
                route_counts[prev.index()] += route_counts[node.index()] + 1;
            }
            _ => {}
        }
    }

    RouteSample {
        source: from,
        reachable: order.len() - 1,
        distances,
        hops,
        predecessors,
        route_counts,
    }
}

/// The `n_refresh` generated edges of `sample.source` with the fewest routes
/// through them; ties go to the lower index.
pub fn select_weak_edges(graph: &OverlayGraph, sample: &RouteSample, n_refresh: usize) -> Vec<NodeId> {
    let mut owned: Vec<NodeId> = graph.generated(sample.source).iter().copied().collect();
    owned.sort_by_key(|&peer| (sample.route_count(peer), peer));
    owned.truncate(n_refresh);
    owned
}

/// Aggregates of one adaptive round, measured before any edge moved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Mean latency distance over all reachable ordered pairs
    pub avg_distance: f64,
    /// Ordered pairs with no path
    pub unreachable: usize,
    pub degree_histogram: Vec<usize>,
    /// Generated edges retracted this round as `(owner, peer)`
    pub removed: Vec<(NodeId, NodeId)>,
    /// Nodes whose resaturation ran out of attempts
    pub unsaturated: usize,
}

impl RoundReport {
    pub fn route_kills(&self) -> usize {
        self.removed.len()
    }
}

struct NodePlan {
    weak: Vec<NodeId>,
    reachable: usize,
    distance_total: u64,
    unreachable: usize,
}

/// One adaptive optimisation round over the whole graph.
pub fn run_round<R: Rng + ?Sized>(
    graph: &mut OverlayGraph,
    saturator: &Saturator<'_>,
    n_refresh: usize,
    rng: &mut R,
) -> RoundReport {
    let latency = saturator.latency();
    let snapshot: &OverlayGraph = graph;

    let plans: Vec<NodePlan> = (0..snapshot.size())
        .into_par_iter()
        .map(|index| {
            let sample = compute_routes(snapshot, latency, NodeId::new(index));
            NodePlan {
                weak: select_weak_edges(snapshot, &sample, n_refresh),
                reachable: sample.reachable,
                distance_total: sample.distance_total(),
                unreachable: sample.unreachable(),
            }
        })
        .collect();

    let degree_histogram = snapshot.degree_histogram();
    let reachable_pairs: usize = plans.iter().map(|p| p.reachable).sum();
    let distance_total: u64 = plans.iter().map(|p| p.distance_total).sum();
    let unreachable: usize = plans.iter().map(|p| p.unreachable).sum();
    let avg_distance = if reachable_pairs == 0 {
        0.0
    } else {
        distance_total as f64 / reachable_pairs as f64
    };

    let mut removed = Vec::new();
    let mut unsaturated = 0usize;
    for (index, plan) in plans.into_iter().enumerate() {
        let node = NodeId::new(index);
        for peer in plan.weak {
            if saturator.remove_edge(graph, node, peer) {
                removed.push((node, peer));
            }
        }
        if !saturator.saturate_node(graph, node, rng) {
            unsaturated += 1;
        }
    }

    debug!(
        "Round retracted {} edges, {} nodes left unsaturated",
        removed.len(),
        unsaturated
    );
    info!(
        "Round: avg distance {:.2}, {} unreachable pairs, {} route kills",
        avg_distance,
        unreachable,
        removed.len()
    );

    RoundReport {
        avg_distance,
        unreachable,
        degree_histogram,
        removed,
        unsaturated,
    }
}
