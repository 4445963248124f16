//! Neighbor graph construction.
//!
//! Every adjacency phase clears all neighbor sets and re-evaluates each
//! unordered node pair once. Edges are always inserted on both endpoints, so
//! the resulting graph is symmetric by construction. The pairwise scan is
//! O(n²), which is fine for networks of tens of nodes.

use rand::Rng;

use super::geometry::distance2;
use super::types::Node;

/// Link predicate used when rebuilding the neighbor graph.
///
/// Exactly one policy is active for a run; they are never combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdjacencyPolicy {
    /// Connect when `distance <= min_distance * factor`.
    Proximity { factor: f64 },
    /// Connect with `probability`, but only when `distance > min_distance`.
    RandomDistant { probability: f64 },
}

impl Default for AdjacencyPolicy {
    fn default() -> Self {
        AdjacencyPolicy::Proximity { factor: 1.5 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TopologyBuilder {
    policy: AdjacencyPolicy,
    min_distance: f64,
}

impl TopologyBuilder {
    pub fn new(policy: AdjacencyPolicy, min_distance: f64) -> Self {
        Self { policy, min_distance }
    }

    /// Recompute the neighbor graph from current positions.
    ///
    /// # Returns
    ///
    /// The number of undirected edges in the new graph.
    pub fn rebuild<R: Rng + ?Sized>(&self, nodes: &mut [Node], rng: &mut R) -> usize {
        clear_neighbors(nodes);

        let mut edges = 0;
        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                let d2 = distance2(&nodes[a].position, &nodes[b].position);
                if self.is_linked(d2, rng) {
                    let (id_a, id_b) = (nodes[a].node_id, nodes[b].node_id);
                    nodes[a].neighbors.insert(id_b);
                    nodes[b].neighbors.insert(id_a);
                    edges += 1;
                }
            }
        }
        edges
    }

    fn is_linked<R: Rng + ?Sized>(&self, d2: f64, rng: &mut R) -> bool {
        match self.policy {
            AdjacencyPolicy::Proximity { factor } => {
                let range = self.min_distance * factor;
                d2 <= range * range
            }
            AdjacencyPolicy::RandomDistant { probability } => d2 > self.min_distance * self.min_distance && rng.gen_bool(probability),
        }
    }
}

pub fn clear_neighbors(nodes: &mut [Node]) {
    for node in nodes.iter_mut() {
        node.neighbors.clear();
    }
}

/// Number of undirected edges, assuming the graph is symmetric.
pub fn edge_count(nodes: &[Node]) -> usize {
    nodes.iter().map(|n| n.neighbors.len()).sum::<usize>() / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::Point;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn nodes_at(points: &[(f64, f64)]) -> Vec<Node> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Node::new(i as u32, Point::new(x, y), Point::new(x, y)))
            .collect()
    }

    fn assert_symmetric(nodes: &[Node]) {
        for a in nodes {
            for b in &a.neighbors {
                assert!(nodes[*b as usize].neighbors.contains(&a.node_id), "{} -> {} not mirrored", a.node_id, b);
            }
        }
    }

    #[test]
    fn proximity_links_within_one_and_a_half_min_distance() {
        let mut rng = StdRng::seed_from_u64(0);
        // 0-1 at 150 (inclusive edge), 1-2 at 151, 0-2 at 301.
        let mut nodes = nodes_at(&[(0.0, 0.0), (150.0, 0.0), (301.0, 0.0)]);
        let builder = TopologyBuilder::new(AdjacencyPolicy::Proximity { factor: 1.5 }, 100.0);

        let edges = builder.rebuild(&mut nodes, &mut rng);

        assert_eq!(edges, 1);
        assert!(nodes[0].neighbors.contains(&1));
        assert!(nodes[2].neighbors.is_empty());
        assert_symmetric(&nodes);
    }

    #[test]
    fn rebuild_discards_previous_edges() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes = nodes_at(&[(0.0, 0.0), (50.0, 0.0)]);
        let builder = TopologyBuilder::new(AdjacencyPolicy::default(), 100.0);
        builder.rebuild(&mut nodes, &mut rng);
        assert_eq!(edge_count(&nodes), 1);

        nodes[1].position = Point::new(700.0, 0.0);
        builder.rebuild(&mut nodes, &mut rng);
        assert_eq!(edge_count(&nodes), 0);
    }

    #[test]
    fn random_distant_never_links_close_pairs() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut nodes = nodes_at(&[(0.0, 0.0), (20.0, 0.0), (40.0, 0.0)]);
        let builder = TopologyBuilder::new(AdjacencyPolicy::RandomDistant { probability: 1.0 }, 100.0);
        assert_eq!(builder.rebuild(&mut nodes, &mut rng), 0);
    }

    #[test]
    fn random_distant_with_certain_probability_links_all_far_pairs() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut nodes = nodes_at(&[(0.0, 0.0), (200.0, 0.0), (0.0, 200.0), (200.0, 200.0)]);
        let builder = TopologyBuilder::new(AdjacencyPolicy::RandomDistant { probability: 1.0 }, 100.0);
        assert_eq!(builder.rebuild(&mut nodes, &mut rng), 6);
        assert_symmetric(&nodes);
    }

    #[test]
    fn random_graphs_are_symmetric() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<(f64, f64)> = (0..25).map(|i| ((i * 37 % 700) as f64, (i * 53 % 500) as f64)).collect();
        let mut nodes = nodes_at(&points);
        let builder = TopologyBuilder::new(AdjacencyPolicy::RandomDistant { probability: 0.3 }, 100.0);
        for _ in 0..10 {
            builder.rebuild(&mut nodes, &mut rng);
            assert_symmetric(&nodes);
        }
    }
}
