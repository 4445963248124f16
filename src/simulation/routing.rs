//! OGM origination and flooding.
//!
//! Each node periodically announces itself with an Originator Message carrying
//! a fresh sequence number. A receiver installs `(sender, seq)` as its route to
//! the origin when it has no entry yet or the stored sequence is strictly lower,
//! and then re-floods the OGM to every neighbor except the one it came from.
//! Stale and duplicate OGMs (sequence lower than or equal to the stored one)
//! are dropped without re-flooding, which bounds every round.
//!
//! The flood is processed as a FIFO work queue. For a static topology the
//! first arrival at a node is therefore one with the fewest hops, and since an
//! equal sequence never overwrites an entry, that first next hop sticks.

use std::collections::VecDeque;

use super::types::{Node, NodeId, RouteEntry};

/// An Originator Message in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ogm {
    pub origin: NodeId,
    /// Node that transmitted this copy; becomes the receiver's next hop.
    pub sender: NodeId,
    pub sequence: u32,
}

/// Outcome of handing one OGM to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OgmVerdict {
    /// Routing entry installed or refreshed; the OGM must be re-flooded.
    Accepted,
    /// Sequence not newer than the stored one; dropped silently.
    Stale,
    /// The node's own announcement came back around a cycle.
    OwnOrigin,
}

/// Counters for one or more OGM floods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OgmRoundStats {
    pub originated: u64,
    pub delivered: u64,
    pub accepted: u64,
    pub suppressed: u64,
}

impl OgmRoundStats {
    pub fn merge(&mut self, other: &OgmRoundStats) {
        self.originated += other.originated;
        self.delivered += other.delivered;
        self.accepted += other.accepted;
        self.suppressed += other.suppressed;
    }
}

/// Apply the acceptance rule for a single OGM at `node`.
///
/// The stored sequence for an origin only ever increases.
pub fn receive_ogm(node: &mut Node, ogm: &Ogm) -> OgmVerdict {
    if ogm.origin == node.node_id {
        return OgmVerdict::OwnOrigin;
    }

    let is_newer = match node.routing_table.get(&ogm.origin) {
        Some(entry) => ogm.sequence > entry.sequence,
        None => true,
    };
    if !is_newer {
        return OgmVerdict::Stale;
    }

    node.routing_table.insert(
        ogm.origin,
        RouteEntry {
            next_hop: ogm.sender,
            sequence: ogm.sequence,
        },
    );
    log::trace!("[{}] OGM from origin {} via {} accepted (seq {})", node.node_id, ogm.origin, ogm.sender, ogm.sequence);
    OgmVerdict::Accepted
}

/// Run one broadcast round: every node, in id order, originates one OGM that
/// floods to completion before the next node starts.
pub fn broadcast_round(nodes: &mut [Node]) -> OgmRoundStats {
    let mut stats = OgmRoundStats::default();
    for index in 0..nodes.len() {
        let origin = nodes[index].node_id;
        stats.merge(&originate_ogm(nodes, origin));
    }
    stats
}

/// Increment `origin`'s sequence number and flood its OGM through the
/// current neighbor graph.
///
/// A node with no neighbors still consumes a sequence number.
pub fn originate_ogm(nodes: &mut [Node], origin: NodeId) -> OgmRoundStats {
    let mut stats = OgmRoundStats::default();
    let Some(node) = nodes.get_mut(origin as usize) else {
        log::warn!("Cannot originate OGM for missing node {}", origin);
        return stats;
    };

    node.origin_sequence += 1;
    let sequence = node.origin_sequence;
    stats.originated = 1;

    let mut queue: VecDeque<(NodeId, Ogm)> = node
        .neighbors
        .iter()
        .map(|&neighbor| (neighbor, Ogm { origin, sender: origin, sequence }))
        .collect();
    log::debug!("[{}] Originating OGM seq {} to {} neighbors", origin, sequence, queue.len());

    while let Some((receiver, ogm)) = queue.pop_front() {
        stats.delivered += 1;
        let Some(node) = nodes.get_mut(receiver as usize) else {
            log::warn!("OGM from {} addressed to missing node {}", ogm.sender, receiver);
            continue;
        };

        match receive_ogm(node, &ogm) {
            OgmVerdict::Accepted => {
                stats.accepted += 1;
                let relay = Ogm {
                    origin: ogm.origin,
                    sender: receiver,
                    sequence: ogm.sequence,
                };
                queue.extend(node.neighbors.iter().filter(|&&n| n != ogm.sender).map(|&n| (n, relay)));
            }
            OgmVerdict::Stale | OgmVerdict::OwnOrigin => stats.suppressed += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::Point;

    fn network(node_count: usize, edges: &[(u32, u32)]) -> Vec<Node> {
        let mut nodes: Vec<Node> = (0..node_count as u32).map(|id| Node::new(id, Point::new(0.0, 0.0), Point::new(0.0, 0.0))).collect();
        for &(a, b) in edges {
            nodes[a as usize].neighbors.insert(b);
            nodes[b as usize].neighbors.insert(a);
        }
        nodes
    }

    fn entry(nodes: &[Node], at: u32, destination: u32) -> Option<RouteEntry> {
        nodes[at as usize].routing_table.get(&destination).copied()
    }

    #[test]
    fn line_topology_learns_routes_and_drops_stale_duplicates() {
        // A(0) - B(1) - C(2)
        let mut nodes = network(3, &[(0, 1), (1, 2)]);

        originate_ogm(&mut nodes, 0);
        assert_eq!(entry(&nodes, 1, 0), Some(RouteEntry { next_hop: 0, sequence: 1 }));
        assert_eq!(entry(&nodes, 2, 0), Some(RouteEntry { next_hop: 1, sequence: 1 }));
        assert!(nodes[0].routing_table.is_empty());

        originate_ogm(&mut nodes, 0);
        assert_eq!(entry(&nodes, 1, 0), Some(RouteEntry { next_hop: 0, sequence: 2 }));

        // A delayed copy of the first announcement shows up late.
        let verdict = receive_ogm(&mut nodes[1], &Ogm { origin: 0, sender: 0, sequence: 1 });
        assert_eq!(verdict, OgmVerdict::Stale);
        assert_eq!(entry(&nodes, 1, 0), Some(RouteEntry { next_hop: 0, sequence: 2 }));
    }

    #[test]
    fn equal_sequence_does_not_overwrite_first_arrival() {
        let mut nodes = network(2, &[]);
        assert_eq!(receive_ogm(&mut nodes[1], &Ogm { origin: 0, sender: 0, sequence: 4 }), OgmVerdict::Accepted);
        assert_eq!(receive_ogm(&mut nodes[1], &Ogm { origin: 0, sender: 5, sequence: 4 }), OgmVerdict::Stale);
        assert_eq!(entry(&nodes, 1, 0), Some(RouteEntry { next_hop: 0, sequence: 4 }));
    }

    #[test]
    fn stored_sequence_never_decreases() {
        let mut nodes = network(2, &[]);
        let mut highest = 0;
        for sequence in [3, 1, 7, 7, 2, 9, 8, 9, 10, 4] {
            receive_ogm(&mut nodes[1], &Ogm { origin: 0, sender: 0, sequence });
            let stored = entry(&nodes, 1, 0).map(|e| e.sequence).unwrap_or(0);
            assert!(stored >= highest);
            highest = stored;
        }
        assert_eq!(highest, 10);
    }

    #[test]
    fn cycles_do_not_create_self_entries_and_terminate() {
        // Fully connected triangle plus a tail: 0-1, 1-2, 2-0, 2-3
        let mut nodes = network(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let stats = originate_ogm(&mut nodes, 0);

        assert!(!nodes[0].routing_table.contains_key(&0));
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.delivered, stats.accepted + stats.suppressed);
        // First arrival wins: both 1 and 2 hear 0 directly.
        assert_eq!(entry(&nodes, 1, 0).map(|e| e.next_hop), Some(0));
        assert_eq!(entry(&nodes, 2, 0).map(|e| e.next_hop), Some(0));
        assert_eq!(entry(&nodes, 3, 0).map(|e| e.next_hop), Some(2));
    }

    #[test]
    fn broadcast_round_converges_on_connected_graph() {
        // Ring of six with one chord.
        let mut nodes = network(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (1, 4)]);
        broadcast_round(&mut nodes);

        for node in &nodes {
            assert_eq!(node.origin_sequence, 1);
            assert_eq!(node.routing_table.len(), 5);
            for (destination, route) in &node.routing_table {
                assert_ne!(*destination, node.node_id);
                assert!(node.neighbors.contains(&route.next_hop), "node {} routes via non-neighbor {}", node.node_id, route.next_hop);
            }
        }
    }

    #[test]
    fn disconnected_nodes_keep_no_route() {
        let mut nodes = network(3, &[(0, 1)]);
        let stats = broadcast_round(&mut nodes);
        assert_eq!(stats.originated, 3);
        assert!(nodes[2].routing_table.is_empty());
        assert!(!nodes[0].routing_table.contains_key(&2));
        assert_eq!(nodes[2].origin_sequence, 1);
    }
}
