// UI module for the B.A.T.M.A.N. mesh simulator
//
// This module organizes the UI into separate components:
// - `top_panel`: Simulation controls and network metrics
// - `right_panel`: Node inspector (routing table, neighbors, log stream)
// - `map`: Central map display with nodes and neighbor links
// - `app_state`: Application state management and main update loop

pub mod app_state;
pub mod map;
pub mod right_panel;
pub mod top_panel;

use crate::simulation::driver::DriverStatistics;
use crate::simulation::geometry::WorldBounds;
use crate::simulation::types::{DisplayState, MessageId, NodeId, NodeLogEntry, Phase, Point, RouteRow};

pub use app_state::AppState;

/// Per-node state needed to draw the map.
#[derive(Debug, Clone)]
pub struct NodeUIState {
    pub node_id: NodeId,
    pub position: Point,
    pub neighbors: Vec<NodeId>,
    pub display_state: DisplayState,
}

/// Everything the top panel and map show, published after every tick.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub tick: u64,
    pub running: bool,
    /// Phase executed by the last running tick.
    pub last_phase: Option<Phase>,
    pub upcoming_phase: Phase,
    pub nodes: Vec<NodeUIState>,
    pub edge_count: usize,
    pub pending_flood_events: usize,
    pub statistics: DriverStatistics,
}

/// Inspector details for one node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub position: Point,
    pub target_position: Point,
    pub origin_sequence: u32,
    pub neighbors: Vec<NodeId>,
    pub routes: Vec<RouteRow>,
    pub log_lines: Vec<NodeLogEntry>,
}

#[derive(Debug)]
pub enum UIRefreshState {
    Alert(String),
    WorldBoundsUpdated(WorldBounds),
    NetworkUpdated(NetworkSnapshot),
    NodeInfo(NodeInfo),
    /// The inspected node no longer exists.
    NodeInfoUnavailable(NodeId),
    MessageBroadcast(NodeId, MessageId), // origin, message ID
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UICommand {
    Start,
    Stop,
    Reset,
    AddNode,
    RemoveNode,
    /// Flood a new message from the given node, or a random one.
    BroadcastMessage(Option<NodeId>),
    RequestNodeInfo(NodeId),
}
