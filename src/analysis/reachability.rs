//! Hop-distance and reachability queries.

use std::collections::VecDeque;

use crate::topology::{NodeId, OverlayGraph};

/// Distance reported for nodes the traversal never reached
pub const UNREACHABLE: i32 = -1;

/// Breadth-first hop distances from `source`; [`UNREACHABLE`] for nodes in
/// other components.
pub fn distances_from(graph: &OverlayGraph, source: NodeId) -> Vec<i32> {
    let mut distance = vec![UNREACHABLE; graph.size()];
    distance[source.index()] = 0;

    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        let next = distance[node.index()] + 1;
        for &neighbor in graph.neighbors(node) {
            if distance[neighbor.index()] == UNREACHABLE {
                distance[neighbor.index()] = next;
                queue.push_back(neighbor);
            }
        }
    }

    distance
}

/// Number of nodes a traversal from `source` never dequeues.
pub fn count_unreachable(graph: &OverlayGraph, source: NodeId) -> usize {
    let mut seen = vec![false; graph.size()];
    seen[source.index()] = true;
    let mut visited = 0usize;

    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        visited += 1;
        for &neighbor in graph.neighbors(node) {
            if !seen[neighbor.index()] {
                seen[neighbor.index()] = true;
                queue.push_back(neighbor);
            }
        }
    }

    graph.size() - visited
}

/// Mean fraction of ordered pairs that cannot reach each other.
pub fn unavailability(graph: &OverlayGraph) -> f64 {
    let size = graph.size();
    if size == 0 {
        return 0.0;
    }
    let unreachable: usize = graph.nodes().map(|node| count_unreachable(graph, node)).sum();
    unreachable as f64 / (size * size) as f64
}

/// Largest finite hop distance from `source`.
pub fn eccentricity(graph: &OverlayGraph, source: NodeId) -> i32 {
    distances_from(graph, source).into_iter().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_components() -> OverlayGraph {
        // path 0-1-2 and edge 3-4
        OverlayGraph::from_edges(5, &[(0, 1), (1, 2), (3, 4)])
    }

    #[test]
    fn test_distances_across_components() {
        let graph = two_components();

        assert_eq!(distances_from(&graph, NodeId::new(0)), vec![0, 1, 2, -1, -1]);
        assert_eq!(distances_from(&graph, NodeId::new(2)), vec![2, 1, 0, -1, -1]);
        assert_eq!(distances_from(&graph, NodeId::new(4)), vec![-1, -1, -1, 1, 0]);
    }

    #[test]
    fn test_count_unreachable() {
        let graph = two_components();
        assert_eq!(count_unreachable(&graph, NodeId::new(1)), 2);
        assert_eq!(count_unreachable(&graph, NodeId::new(3)), 3);

        // 3 sources miss 2 nodes, 2 sources miss 3 nodes
        let expected = (3.0 * 2.0 + 2.0 * 3.0) / 25.0;
        assert!((unavailability(&graph) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ring_of_six() {
        let graph = OverlayGraph::ring(6);
        for node in graph.nodes() {
            assert_eq!(eccentricity(&graph, node), 3);
            assert_eq!(count_unreachable(&graph, node), 0);
        }
        assert_eq!(unavailability(&graph), 0.0);
    }

    #[test]
    fn test_isolated_source() {
        let graph = OverlayGraph::new(3);
        assert_eq!(distances_from(&graph, NodeId::new(1)), vec![-1, 0, -1]);
        assert_eq!(count_unreachable(&graph, NodeId::new(1)), 2);
    }
}
