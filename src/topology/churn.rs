//! Churn operators: permanent node removal and edge-resetting reboots.

use std::collections::BTreeSet;

use log::debug;
use rand::Rng;

use super::types::{NodeId, OverlayGraph};

/// Effect of a [`reboot`] pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebootOutcome {
    /// Nodes that rebooted, in index order
    pub rebooted: Vec<NodeId>,
    /// Nodes that lost at least one generated edge and should resaturate
    pub needs_saturation: BTreeSet<NodeId>,
    pub edges_dropped: usize,
}

/// Keep nodes `0 .. floor(survive_fraction * size)` and drop every reference
/// to removed indices. Returns the number of removed nodes.
///
/// Index order stands in for join order: the most recently joined nodes die
/// first. `survive_fraction` is clamped to `[0, 1]`.
pub fn kill_nodes(graph: &mut OverlayGraph, survive_fraction: f64) -> usize {
    let size = graph.size();
    let fraction = if survive_fraction.is_nan() {
        0.0
    } else {
        survive_fraction.clamp(0.0, 1.0)
    };
    let survivors = ((fraction * size as f64).floor() as usize).min(size);

    graph.truncate(survivors);
    debug!("Killed {} of {} nodes ({} survive)", size - survivors, size, survivors);
    size - survivors
}

/// Each node independently reboots with probability `probability`: it drops
/// all its generated edges and every edge it received. Peers that lose a
/// generated edge this way are reported alongside the rebooted node so the
/// caller can resaturate both.
pub fn reboot<R: Rng + ?Sized>(graph: &mut OverlayGraph, probability: f64, rng: &mut R) -> RebootOutcome {
    let probability = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
    let mut outcome = RebootOutcome::default();

    for index in 0..graph.size() {
        if !rng.gen_bool(probability) {
            continue;
        }
        reboot_node(graph, NodeId::new(index), &mut outcome);
    }

    debug!(
        "Rebooted {} nodes, dropped {} edges",
        outcome.rebooted.len(),
        outcome.edges_dropped
    );
    outcome
}

fn reboot_node(graph: &mut OverlayGraph, node: NodeId, outcome: &mut RebootOutcome) {
    outcome.rebooted.push(node);
    outcome.needs_saturation.insert(node);

    let owned: Vec<NodeId> = graph.generated(node).iter().copied().collect();
    for peer in owned {
        if graph.remove_edge(node, peer) {
            outcome.edges_dropped += 1;
        }
    }

    let received: Vec<NodeId> = graph.neighbors(node).iter().copied().collect();
    for peer in received {
        if graph.generated(peer).contains(&node) {
            outcome.needs_saturation.insert(peer);
        }
        if graph.remove_edge(peer, node) {
            outcome.edges_dropped += 1;
        }
    }
}
