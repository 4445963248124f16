//! Application message flooding with duplicate suppression.
//!
//! A node that sees a message for the first time records it, marks itself for
//! display, and schedules a forward to its neighbors (all of them for the
//! origin, all but the sender for relays). Forwards and the subsequent return
//! to idle are discrete future events in an explicit queue that the driver
//! advances once per tick, so there are no re-entrant timer callbacks.
//!
//! The seen-set check is unconditional, so each node processes a given message
//! at most once and a flood cannot loop.

use std::collections::BTreeMap;

use super::types::{DisplayState, MessageId, Node, NodeId};

/// Work scheduled for a future tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodEventKind {
    /// Hand the message to the node's current neighbors, skipping `exclude`.
    Forward { message_id: MessageId, exclude: Option<NodeId> },
    /// Return the node's display marker to idle, unless it has newer work queued.
    ResetIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodEvent {
    pub node_id: NodeId,
    pub kind: FloodEventKind,
}

/// Counters for flood processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodStats {
    /// First-time receptions (each node counts at most once per message).
    pub delivered: u64,
    /// Receptions dropped because the node had already seen the message.
    pub suppressed: u64,
    /// Forward events executed.
    pub forwarded: u64,
}

impl FloodStats {
    pub fn merge(&mut self, other: &FloodStats) {
        self.delivered += other.delivered;
        self.suppressed += other.suppressed;
        self.forwarded += other.forwarded;
    }
}

/// Discrete-event scheduler for message floods.
#[derive(Debug)]
pub struct FloodEngine {
    /// Keyed by (due tick, insertion order) so same-tick events keep FIFO order.
    queue: BTreeMap<(u64, u64), FloodEvent>,
    next_order: u64,
    now: u64,
    forward_delay: u64,
    reset_delay: u64,
}

impl FloodEngine {
    pub fn new(forward_delay: u64, reset_delay: u64) -> Self {
        Self {
            queue: BTreeMap::new(),
            next_order: 0,
            now: 0,
            forward_delay,
            reset_delay,
        }
    }

    /// Number of events still waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Start flooding `message_id` from `origin`.
    ///
    /// Returns `false` (and does nothing) if the origin already saw the message.
    pub fn originate(&mut self, nodes: &mut [Node], origin: NodeId, message_id: MessageId) -> bool {
        let Some(node) = nodes.get_mut(origin as usize) else {
            return false;
        };
        if !node.seen_messages.insert(message_id) {
            log::debug!("[{}] Message {} already seen, not originating", origin, message_id);
            return false;
        }
        node.display_state = DisplayState::Transmitting;
        log::info!("[{}] Originating message {}", origin, message_id);
        self.schedule(self.forward_delay, origin, FloodEventKind::Forward { message_id, exclude: None });
        true
    }

    /// Deliver `message_id` from `sender` to `node_id`.
    ///
    /// Returns `true` on first reception, `false` if suppressed as a duplicate.
    pub fn receive(&mut self, nodes: &mut [Node], node_id: NodeId, message_id: MessageId, sender: NodeId) -> bool {
        let Some(node) = nodes.get_mut(node_id as usize) else {
            return false;
        };
        if !node.seen_messages.insert(message_id) {
            log::trace!("[{}] Duplicate message {} from {} suppressed", node_id, message_id, sender);
            return false;
        }
        node.display_state = DisplayState::Received;
        log::debug!("[{}] Received message {} from {}", node_id, message_id, sender);
        self.schedule(
            self.forward_delay,
            node_id,
            FloodEventKind::Forward {
                message_id,
                exclude: Some(sender),
            },
        );
        true
    }

    /// Advance the clock by one tick and run every event that became due.
    ///
    /// Events scheduled with a zero delay while processing run in the same call.
    pub fn advance(&mut self, nodes: &mut [Node]) -> FloodStats {
        self.now += 1;
        let mut stats = FloodStats::default();
        if self.is_idle() {
            return stats;
        }

        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > self.now {
                break;
            }
            let event = entry.remove();
            self.run(nodes, event, &mut stats);
        }

        stats
    }

    fn run(&mut self, nodes: &mut [Node], event: FloodEvent, stats: &mut FloodStats) {
        match event.kind {
            FloodEventKind::Forward { message_id, exclude } => {
                let Some(node) = nodes.get(event.node_id as usize) else {
                    return;
                };
                let targets: Vec<NodeId> = node.neighbors.iter().copied().filter(|&n| Some(n) != exclude).collect();
                stats.forwarded += 1;
                for target in targets {
                    if self.receive(nodes, target, message_id, event.node_id) {
                        stats.delivered += 1;
                    } else {
                        stats.suppressed += 1;
                    }
                }
                self.schedule(self.reset_delay, event.node_id, FloodEventKind::ResetIdle);
            }
            FloodEventKind::ResetIdle => {
                // A later message owns the marker until its own reset runs.
                if self.queue.values().any(|pending| pending.node_id == event.node_id) {
                    return;
                }
                if let Some(node) = nodes.get_mut(event.node_id as usize) {
                    node.display_state = DisplayState::Idle;
                }
            }
        }
    }

    /// Drop every pending event that acts on `node_id`.
    ///
    /// Ids are reused after removal, so queued work must not leak onto a new node.
    pub fn forget_node(&mut self, node_id: NodeId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|_, event| event.node_id != node_id);
        before - self.queue.len()
    }

    fn schedule(&mut self, delay: u64, node_id: NodeId, kind: FloodEventKind) {
        let key = (self.now + delay, self.next_order);
        self.next_order += 1;
        self.queue.insert(key, FloodEvent { node_id, kind });
    }
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

    fn run_until_idle(engine: &mut FloodEngine, nodes: &mut [Node]) -> FloodStats {
        let mut total = FloodStats::default();
        for _ in 0..100 {
            if engine.is_idle() {
                break;
            }
            total.merge(&engine.advance(nodes));
        }
        assert!(engine.is_idle());
        total
    }

    #[test]
    fn full_mesh_reaches_every_node_exactly_once() {
        let mut nodes = network(4, &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        let mut engine = FloodEngine::new(1, 3);

        assert!(engine.originate(&mut nodes, 0, 77));
        let stats = run_until_idle(&mut engine, &mut nodes);

        assert_eq!(stats.delivered, 3);
        for node in &nodes {
            assert!(node.seen_messages.contains(&77));
            assert_eq!(node.display_state, DisplayState::Idle);
        }
        // Each relay offers the message to its two other peers, who already have it.
        assert_eq!(stats.forwarded, 4);
        assert_eq!(stats.delivered + stats.suppressed, 3 + 3 * 2);
    }

    #[test]
    fn processing_events_never_exceed_node_count() {
        let edges: Vec<(u32, u32)> = (0..10u32).flat_map(|a| ((a + 1)..10).filter(move |b| (a + b) % 3 != 0).map(move |b| (a, b))).collect();
        let mut nodes = network(10, &edges);
        let mut engine = FloodEngine::new(1, 2);
        engine.originate(&mut nodes, 4, 1);
        let stats = run_until_idle(&mut engine, &mut nodes);
        assert!(stats.delivered < 10);
        assert!(stats.forwarded <= 10);
    }

    #[test]
    fn originating_a_seen_message_is_a_no_op() {
        let mut nodes = network(2, &[(0, 1)]);
        let mut engine = FloodEngine::new(1, 1);
        assert!(engine.originate(&mut nodes, 0, 5));
        assert!(!engine.originate(&mut nodes, 0, 5));
        assert_eq!(engine.pending(), 1);
    }

    #[test]
    fn forwarding_waits_for_the_scheduled_tick() {
        let mut nodes = network(2, &[(0, 1)]);
        let mut engine = FloodEngine::new(2, 1);
        engine.originate(&mut nodes, 0, 9);
        assert_eq!(nodes[0].display_state, DisplayState::Transmitting);

        let first = engine.advance(&mut nodes);
        assert_eq!(first.delivered, 0);
        assert!(!nodes[1].seen_messages.contains(&9));

        let second = engine.advance(&mut nodes);
        assert_eq!(second.delivered, 1);
        assert_eq!(nodes[1].display_state, DisplayState::Received);
    }

    #[test]
    fn line_flood_skips_the_sender() {
        let mut nodes = network(3, &[(0, 1), (1, 2)]);
        let mut engine = FloodEngine::new(1, 1);
        engine.originate(&mut nodes, 0, 3);
        let stats = run_until_idle(&mut engine, &mut nodes);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.suppressed, 0);
    }

    #[test]
    fn forget_node_drops_its_pending_work() {
        let mut nodes = network(3, &[(0, 1), (1, 2)]);
        let mut engine = FloodEngine::new(1, 1);
        engine.originate(&mut nodes, 0, 3);
        engine.advance(&mut nodes);
        // 0 has a pending reset, 1 a pending forward.
        assert_eq!(engine.pending(), 2);
        assert_eq!(engine.forget_node(1), 1);
        run_until_idle(&mut engine, &mut nodes);
        assert!(!nodes[2].seen_messages.contains(&3));
        assert_eq!(nodes[0].display_state, DisplayState::Idle);
    }

    #[test]
    fn newer_message_keeps_the_marker_until_its_own_reset() {
        let mut nodes = network(2, &[(0, 1)]);
        let mut engine = FloodEngine::new(1, 2);
        engine.originate(&mut nodes, 0, 1);
        // Forward of message 1 runs; its reset is due at tick 3.
        engine.advance(&mut nodes);
        engine.originate(&mut nodes, 0, 2);
        engine.advance(&mut nodes);

        // Tick 3: the reset for message 1 is skipped.
        engine.advance(&mut nodes);
        assert_eq!(nodes[0].display_state, DisplayState::Transmitting);

        run_until_idle(&mut engine, &mut nodes);
        assert_eq!(nodes[0].display_state, DisplayState::Idle);
        assert_eq!(nodes[1].display_state, DisplayState::Idle);
    }
}
