//! Type definitions for the simulation.
//!
//! Contains the data structures shared across the engine:
//! - Node identity, position and protocol state
//! - Routing table entries and their display rows
//! - Simulation phases and presentation markers
//! - Per-node captured log history

use embassy_time::Instant;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Node identifier. Ids are dense: a network of `n` nodes uses `0..n`.
pub type NodeId = u32;

/// Application message identifier used by flood dissemination.
pub type MessageId = u32;

/// Maximum log history per node (ring buffer). Bounded to keep UI/memory predictable.
pub const NODE_LOG_CAPACITY: usize = 1000;

/// Simple 2D point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Initial placement of a node, either loaded from a scene file or sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePlacement {
    pub position: Point,
    /// Attractor for the converge phase. Sampled at random when absent.
    pub target_position: Option<Point>,
}

/// The discrete phases the driver advances through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Collision-avoiding random walk.
    Scatter,
    /// Move toward each node's fixed target position.
    Converge,
    /// Recompute the neighbor graph from current positions.
    Rebuild,
    /// Every node originates one OGM which floods through the network.
    BroadcastOgm,
    /// Random walk without collision avoidance.
    Depart,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Scatter => write!(f, "Scatter"),
            Phase::Converge => write!(f, "Converge"),
            Phase::Rebuild => write!(f, "Rebuild"),
            Phase::BroadcastOgm => write!(f, "Broadcast OGM"),
            Phase::Depart => write!(f, "Depart"),
        }
    }
}

/// Presentation-only marker; never consulted by the protocol logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayState {
    #[default]
    Idle,
    /// Node originated an application message.
    Transmitting,
    /// Node accepted and is relaying an application message.
    Received,
}

/// A routing table entry: best known next hop toward a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub next_hop: NodeId,
    pub sequence: u32,
}

/// One row of a routing table as handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRow {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub sequence: u32,
}

/// Severity of a captured log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Log line attributed to a single node.
#[derive(Debug, Clone)]
pub struct NodeLogEntry {
    pub timestamp: Instant,
    pub level: LogLevel,
    pub content: String,
}

/// A mobile mesh node.
///
/// Neighbor and routing relations are stored as ids into the owning
/// [`Network`](super::network::Network) arena, never as references.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: NodeId,
    pub position: Point,
    pub target_position: Point,
    /// Symmetric adjacency; rebuilt from scratch every adjacency phase.
    pub neighbors: BTreeSet<NodeId>,
    /// destination -> (next hop, sequence). Ordered so inspection is stable.
    pub routing_table: BTreeMap<NodeId, RouteEntry>,
    /// Own OGM sequence number, incremented once per broadcast round.
    pub origin_sequence: u32,
    /// Application messages this node has already processed.
    pub seen_messages: HashSet<MessageId>,
    pub display_state: DisplayState,
    pub log_history: VecDeque<NodeLogEntry>,
}

impl Node {
    pub fn new(node_id: NodeId, position: Point, target_position: Point) -> Self {
        Self {
            node_id,
            position,
            target_position,
            neighbors: BTreeSet::new(),
            routing_table: BTreeMap::new(),
            origin_sequence: 0,
            seen_messages: HashSet::new(),
            display_state: DisplayState::Idle,
            log_history: VecDeque::new(),
        }
    }

    /// Routing table flattened into display rows, ordered by destination.
    pub fn route_rows(&self) -> Vec<RouteRow> {
        self.routing_table
            .iter()
            .map(|(&destination, entry)| RouteRow {
                destination,
                next_hop: entry.next_hop,
                sequence: entry.sequence,
            })
            .collect()
    }

    /// Push a log entry into this node's bounded history, popping the oldest if
    /// at capacity.
    pub fn push_log(&mut self, entry: NodeLogEntry) {
        if self.log_history.len() >= NODE_LOG_CAPACITY {
            self.log_history.pop_front();
        }
        self.log_history.push_back(entry);
    }

    /// Drop every relation pointing at `removed`.
    ///
    /// Returns the number of routing entries purged.
    pub fn forget(&mut self, removed: NodeId) -> usize {
        self.neighbors.remove(&removed);
        let before = self.routing_table.len();
        self.routing_table.retain(|&destination, entry| destination != removed && entry.next_hop != removed);
        before - self.routing_table.len()
    }
}
