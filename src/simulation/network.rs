//! The node arena and the operations the driver calls on it.
//!
//! Nodes live in a `Vec` indexed by id, and ids are always dense (`0..len`).
//! Removal only ever takes the highest id, so the next added node reuses it.
//! Neighbor and routing relations hold ids, never references, and removal
//! cascades through every other node so no relation is left dangling.

use rand::Rng;
use rand::rngs::StdRng;

use crate::common::config::SimulationConfig;

use super::error::SimulationError;
use super::flood::{FloodEngine, FloodStats};
use super::geometry::WorldBounds;
use super::mobility::MobilityModel;
use super::routing::{OgmRoundStats, broadcast_round};
use super::topology::{TopologyBuilder, edge_count};
use super::types::{MessageId, Node, NodeId, NodePlacement, Phase, RouteRow};

/// What a single phase did to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// A movement phase ran; number of nodes whose position changed.
    Moved(usize),
    /// The neighbor graph was rebuilt with this many undirected edges.
    Rebuilt { edges: usize },
    /// Every node originated one OGM.
    Broadcast(OgmRoundStats),
}

#[derive(Debug)]
pub struct Network {
    bounds: WorldBounds,
    mobility: MobilityModel,
    topology: TopologyBuilder,
    flood: FloodEngine,
    nodes: Vec<Node>,
    rng: StdRng,
}

impl Network {
    /// Create `config.node_count` nodes with random positions and targets.
    ///
    /// Neighbor sets and routing tables start empty; the first rebuild phase
    /// connects the graph.
    pub fn new(config: &SimulationConfig, rng: StdRng) -> Self {
        let mut network = Self::with_placements(config, &[], rng);
        for _ in 0..config.node_count {
            network.add_node();
        }
        log::info!("Created network with {} nodes", network.len());
        network
    }

    /// Create one node per placement, in order. Missing targets are sampled.
    pub fn with_placements(config: &SimulationConfig, placements: &[NodePlacement], mut rng: StdRng) -> Self {
        let bounds = config.world_bounds();
        let nodes = placements
            .iter()
            .enumerate()
            .map(|(id, placement)| {
                let target = placement.target_position.unwrap_or_else(|| bounds.random_point(&mut rng));
                Node::new(id as NodeId, placement.position, target)
            })
            .collect();

        Self {
            bounds,
            mobility: MobilityModel::new(bounds, config.speed, config.min_distance),
            topology: TopologyBuilder::new(config.adjacency_policy(), config.min_distance),
            flood: FloodEngine::new(config.flood_forward_delay_ticks, config.flood_reset_delay_ticks),
            nodes,
            rng,
        }
    }

    /// Run one phase over the whole node collection.
    ///
    /// Each phase completes before returning, so callers always observe a
    /// consistent network between calls.
    pub fn advance_phase(&mut self, phase: Phase) -> PhaseOutcome {
        match phase {
            Phase::Scatter | Phase::Converge | Phase::Depart => PhaseOutcome::Moved(self.mobility.advance(&mut self.nodes, phase, &mut self.rng)),
            Phase::Rebuild => PhaseOutcome::Rebuilt {
                edges: self.topology.rebuild(&mut self.nodes, &mut self.rng),
            },
            Phase::BroadcastOgm => PhaseOutcome::Broadcast(broadcast_round(&mut self.nodes)),
        }
    }

    /// Append a node with random position and target.
    ///
    /// # Returns
    ///
    /// The new node's id, which is the previous node count.
    pub fn add_node(&mut self) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        let position = self.bounds.random_point(&mut self.rng);
        let target = self.bounds.random_point(&mut self.rng);
        self.nodes.push(Node::new(node_id, position, target));
        log::debug!("[{}] Added at ({:.1}, {:.1})", node_id, position.x, position.y);
        node_id
    }

    /// Remove the highest-id node and every relation that points at it.
    ///
    /// Pending flood events of the removed node are discarded too. Removing
    /// from an empty network is a no-op.
    pub fn remove_node(&mut self) -> Option<NodeId> {
        let removed = self.nodes.pop()?.node_id;

        let mut purged = 0;
        for node in self.nodes.iter_mut() {
            purged += node.forget(removed);
        }
        let dropped_events = self.flood.forget_node(removed);

        log::info!("Removed node {} ({} routing entries purged, {} flood events dropped)", removed, purged, dropped_events);
        Some(removed)
    }

    /// Routing table of `node_id` as display rows ordered by destination.
    pub fn routing_table(&self, node_id: NodeId) -> Result<Vec<RouteRow>, SimulationError> {
        Ok(self.node(node_id)?.route_rows())
    }

    /// Start flooding an application message from `node_id`.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the node had already seen `message_id`.
    pub fn originate_broadcast_message(&mut self, node_id: NodeId, message_id: MessageId) -> Result<bool, SimulationError> {
        self.node(node_id)?;
        Ok(self.flood.originate(&mut self.nodes, node_id, message_id))
    }

    /// Advance the flood event queue by one tick.
    pub fn advance_floods(&mut self) -> FloodStats {
        self.flood.advance(&mut self.nodes)
    }

    pub fn pending_flood_events(&self) -> usize {
        self.flood.pending()
    }

    pub fn node(&self, node_id: NodeId) -> Result<&Node, SimulationError> {
        self.nodes.get(node_id as usize).ok_or(SimulationError::OutOfRange {
            node_id,
            node_count: self.nodes.len(),
        })
    }

    pub fn node_mut(&mut self, node_id: NodeId) -> Result<&mut Node, SimulationError> {
        let node_count = self.nodes.len();
        self.nodes.get_mut(node_id as usize).ok_or(SimulationError::OutOfRange { node_id, node_count })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        edge_count(&self.nodes)
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Uniformly pick an existing node, if any.
    pub fn random_node_id(&mut self) -> Option<NodeId> {
        if self.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..self.nodes.len()) as NodeId)
    }

    /// Verify neighbor symmetry and that no relation names a missing node.
    pub fn check_consistency(&self) -> Result<(), SimulationError> {
        let node_count = self.nodes.len();
        let exists = |id: NodeId| (id as usize) < node_count;

        for node in &self.nodes {
            for &neighbor in &node.neighbors {
                if !exists(neighbor) {
                    return Err(SimulationError::StaleReference {
                        node_id: node.node_id,
                        referenced: neighbor,
                    });
                }
                if !self.nodes[neighbor as usize].neighbors.contains(&node.node_id) {
                    return Err(SimulationError::AsymmetricLink { a: node.node_id, b: neighbor });
                }
            }
            for (&destination, entry) in &node.routing_table {
                for referenced in [destination, entry.next_hop] {
                    if !exists(referenced) {
                        return Err(SimulationError::StaleReference { node_id: node.node_id, referenced });
                    }
                }
            }
        }
        Ok(())
    }
}
