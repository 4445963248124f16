//! Phase scheduling and the simulation control surface.
//!
//! The driver owns the network together with the run state. Each call to
//! [`Driver::tick`] executes exactly one scheduled phase and advances the flood
//! event queue by one tick, then hands control back. Nothing reschedules
//! itself, so stopping is just a matter of not calling into the network.
//!
//! One cycle of the schedule is:
//!
//! `Scatter × scatter_ticks → Converge → Rebuild → BroadcastOgm → Depart → Rebuild`

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::common::config::SimulationConfig;

use super::error::SimulationError;
use super::flood::FloodStats;
use super::log_capture::{CapturedLogEntry, drain_captured_logs};
use super::network::{Network, PhaseOutcome};
use super::routing::OgmRoundStats;
use super::types::{MessageId, NodeId, NodeLogEntry, NodePlacement, Phase, RouteRow};

/// Phases that follow the scatter window in every cycle.
const CYCLE_TAIL: [Phase; 5] = [Phase::Converge, Phase::Rebuild, Phase::BroadcastOgm, Phase::Depart, Phase::Rebuild];

/// Cyclic phase sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSchedule {
    scatter_ticks: u32,
    step: u32,
}

impl PhaseSchedule {
    pub fn new(scatter_ticks: u32) -> Self {
        Self { scatter_ticks, step: 0 }
    }

    fn cycle_len(&self) -> u32 {
        self.scatter_ticks + CYCLE_TAIL.len() as u32
    }

    /// Phase that the next call to [`next_phase`](Self::next_phase) returns.
    pub fn peek(&self) -> Phase {
        if self.step < self.scatter_ticks {
            Phase::Scatter
        } else {
            CYCLE_TAIL[(self.step - self.scatter_ticks) as usize]
        }
    }

    pub fn next_phase(&mut self) -> Phase {
        let phase = self.peek();
        self.step = (self.step + 1) % self.cycle_len();
        phase
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}

/// Totals accumulated since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStatistics {
    pub ogm: OgmRoundStats,
    pub flood: FloodStats,
    pub messages_originated: u64,
}

/// What one call to [`Driver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// `None` while the driver is stopped.
    pub phase: Option<Phase>,
    pub outcome: Option<PhaseOutcome>,
    pub flood: FloodStats,
    pub logs_absorbed: usize,
}

#[derive(Debug)]
pub struct Driver {
    config: SimulationConfig,
    /// Layout from a scene file; reused on reset.
    placements: Option<Vec<NodePlacement>>,
    network: Network,
    schedule: PhaseSchedule,
    running: bool,
    tick: u64,
    next_message_id: MessageId,
    statistics: DriverStatistics,
    /// Where captured node log lines come from.
    log_source: fn() -> Vec<CapturedLogEntry>,
}

impl Driver {
    /// Build the initial network and start in the running state.
    pub fn new(config: SimulationConfig, placements: Option<Vec<NodePlacement>>) -> Self {
        let network = build_network(&config, placements.as_deref());
        Self {
            schedule: PhaseSchedule::new(config.scatter_ticks),
            config,
            placements,
            network,
            running: true,
            tick: 0,
            next_message_id: 0,
            statistics: DriverStatistics::default(),
            log_source: drain_captured_logs,
        }
    }

    #[cfg(test)]
    pub fn with_log_source(mut self, log_source: fn() -> Vec<CapturedLogEntry>) -> Self {
        self.log_source = log_source;
        self
    }

    /// Absorb captured logs and, if running, execute one phase and one flood tick.
    pub fn tick(&mut self) -> TickReport {
        let logs_absorbed = self.flush_logs();

        if !self.running {
            return TickReport {
                tick: self.tick,
                phase: None,
                outcome: None,
                flood: FloodStats::default(),
                logs_absorbed,
            };
        }

        self.tick += 1;
        let phase = self.schedule.next_phase();
        let outcome = self.network.advance_phase(phase);
        if let PhaseOutcome::Broadcast(stats) = &outcome {
            self.statistics.ogm.merge(stats);
            log::debug!(
                "Tick {}: OGM round delivered {} ({} accepted, {} suppressed)",
                self.tick,
                stats.delivered,
                stats.accepted,
                stats.suppressed
            );
        }

        let flood = self.network.advance_floods();
        self.statistics.flood.merge(&flood);

        if cfg!(debug_assertions) {
            if let Err(err) = self.network.check_consistency() {
                log::error!("Network inconsistent after {}: {}", phase, err);
            }
        }

        TickReport {
            tick: self.tick,
            phase: Some(phase),
            outcome: Some(outcome),
            flood,
            logs_absorbed,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::info!("Simulation started");
        }
        self.running = true;
    }

    /// Pause the run. Pending flood events stay queued until [`start`](Self::start).
    pub fn stop(&mut self) {
        if self.running {
            log::info!("Simulation stopped at tick {}", self.tick);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rebuild the network from configuration and clear all counters.
    ///
    /// The running state is kept.
    pub fn reset(&mut self) {
        // Lines from the old network must not reach the rebuilt nodes.
        let discarded = (self.log_source)().len();
        if discarded > 0 {
            log::debug!("Discarded {} captured log lines on reset", discarded);
        }
        self.network = build_network(&self.config, self.placements.as_deref());
        self.schedule.reset();
        self.tick = 0;
        self.next_message_id = 0;
        self.statistics = DriverStatistics::default();
        log::info!("Simulation reset with {} nodes", self.network.len());
    }

    /// Add a node and connect it right away.
    pub fn add_node(&mut self) -> NodeId {
        self.flush_logs();
        let node_id = self.network.add_node();
        self.network.advance_phase(Phase::Rebuild);
        node_id
    }

    /// Remove the highest-id node, if any.
    ///
    /// Captured lines are absorbed first so they are credited to the node that
    /// logged them, not to a later node reusing the id.
    pub fn remove_node(&mut self) -> Option<NodeId> {
        self.flush_logs();
        self.network.remove_node()
    }

    /// Flood a fresh application message from `origin`, or from a random node.
    ///
    /// # Returns
    ///
    /// The originating node and the message id used.
    pub fn broadcast_message(&mut self, origin: Option<NodeId>) -> Result<(NodeId, MessageId), SimulationError> {
        let origin = match origin {
            Some(node_id) => node_id,
            None => self.network.random_node_id().ok_or(SimulationError::OutOfRange { node_id: 0, node_count: 0 })?,
        };
        // Validate before consuming an id.
        self.network.node(origin)?;

        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        if self.network.originate_broadcast_message(origin, message_id)? {
            self.statistics.messages_originated += 1;
        }
        Ok((origin, message_id))
    }

    pub fn routing_table(&self, node_id: NodeId) -> Result<Vec<RouteRow>, SimulationError> {
        self.network.routing_table(node_id)
    }

    fn flush_logs(&mut self) -> usize {
        let entries = (self.log_source)();
        self.absorb_logs(entries)
    }

    /// Move captured log lines into the per-node histories.
    ///
    /// Lines for nodes that no longer exist are dropped.
    pub fn absorb_logs(&mut self, entries: Vec<CapturedLogEntry>) -> usize {
        let mut absorbed = 0;
        for entry in entries {
            if let Ok(node) = self.network.node_mut(entry.node_id) {
                node.push_log(NodeLogEntry {
                    timestamp: entry.timestamp,
                    level: entry.level,
                    content: entry.content,
                });
                absorbed += 1;
            }
        }
        absorbed
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn statistics(&self) -> &DriverStatistics {
        &self.statistics
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Phase the next running tick will execute.
    pub fn upcoming_phase(&self) -> Phase {
        self.schedule.peek()
    }
}

fn build_network(config: &SimulationConfig, placements: Option<&[NodePlacement]>) -> Network {
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    match placements {
        Some(placements) => {
            log::info!("Creating network from {} scene placements", placements.len());
            Network::with_placements(config, placements, rng)
        }
        None => Network::new(config, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::distance;
    use crate::simulation::types::{LogLevel, Point};
    use embassy_time::Instant;
    use std::cell::RefCell;

    thread_local! {
        static PENDING_LOGS: RefCell<Vec<CapturedLogEntry>> = const { RefCell::new(Vec::new()) };
    }

    fn pending_logs() -> Vec<CapturedLogEntry> {
        PENDING_LOGS.with(|pending| pending.take())
    }

    fn capture(node_id: NodeId, content: &str) {
        PENDING_LOGS.with(|pending| {
            pending.borrow_mut().push(CapturedLogEntry {
                node_id,
                timestamp: Instant::from_ticks(0),
                content: content.to_string(),
                level: LogLevel::Debug,
            })
        });
    }

    fn history(driver: &Driver, node_id: NodeId) -> Vec<String> {
        driver.network().nodes()[node_id as usize].log_history.iter().map(|e| e.content.clone()).collect()
    }

    fn seeded(node_count: usize) -> SimulationConfig {
        SimulationConfig {
            node_count,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn line_driver() -> Driver {
        let placements = [(100.0, 100.0), (220.0, 100.0), (340.0, 100.0)]
            .iter()
            .map(|&(x, y)| NodePlacement {
                position: Point::new(x, y),
                target_position: Some(Point::new(x, y)),
            })
            .collect();
        Driver::new(
            SimulationConfig {
                scatter_ticks: 0,
                ..seeded(3)
            },
            Some(placements),
        )
    }

    #[test]
    fn schedule_cycles_through_all_phases() {
        let mut schedule = PhaseSchedule::new(2);
        let phases: Vec<Phase> = (0..9).map(|_| schedule.next_phase()).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Scatter,
                Phase::Scatter,
                Phase::Converge,
                Phase::Rebuild,
                Phase::BroadcastOgm,
                Phase::Depart,
                Phase::Rebuild,
                Phase::Scatter,
                Phase::Scatter,
            ]
        );
    }

    #[test]
    fn schedule_without_scatter_window() {
        let mut schedule = PhaseSchedule::new(0);
        let phases: Vec<Phase> = (0..6).map(|_| schedule.next_phase()).collect();
        assert_eq!(phases[0], Phase::Converge);
        assert_eq!(phases[5], Phase::Converge);
        schedule.reset();
        assert_eq!(schedule.peek(), Phase::Converge);
    }

    #[test]
    fn stopped_driver_leaves_the_network_alone() {
        let mut driver = Driver::new(seeded(5), None);
        driver.stop();
        let before: Vec<Point> = driver.network().nodes().iter().map(|n| n.position).collect();

        for _ in 0..20 {
            let report = driver.tick();
            assert_eq!(report.phase, None);
        }

        let after: Vec<Point> = driver.network().nodes().iter().map(|n| n.position).collect();
        assert_eq!(before, after);
        assert_eq!(driver.tick_count(), 0);
    }

    #[test]
    fn one_cycle_runs_a_broadcast_round() {
        let mut driver = Driver::new(seeded(6), None);
        let cycle = driver.config().scatter_ticks as usize + 5;
        let reports: Vec<TickReport> = (0..cycle).map(|_| driver.tick()).collect();

        assert_eq!(reports.iter().filter(|r| r.phase == Some(Phase::BroadcastOgm)).count(), 1);
        assert_eq!(driver.statistics().ogm.originated, 6);
        assert_eq!(driver.tick_count(), cycle as u64);
        assert_eq!(driver.network().check_consistency(), Ok(()));
    }

    #[test]
    fn added_node_is_connected_immediately() {
        let mut driver = Driver::new(seeded(8), None);
        let node_id = driver.add_node();
        assert_eq!(node_id, 8);

        let nodes = driver.network().nodes();
        let added = &nodes[node_id as usize];
        let range = driver.config().min_distance * driver.config().proximity_factor;
        for other in nodes.iter().filter(|n| n.node_id != node_id) {
            let in_range = distance(&added.position, &other.position) <= range;
            assert_eq!(added.neighbors.contains(&other.node_id), in_range);
        }
    }

    #[test]
    fn broadcast_message_uses_fresh_ids() {
        let mut driver = line_driver();

        assert_eq!(driver.broadcast_message(Some(0)), Ok((0, 0)));
        assert_eq!(driver.broadcast_message(Some(2)), Ok((2, 1)));
        let (origin, message_id) = driver.broadcast_message(None).unwrap();
        assert!(origin < 3);
        assert_eq!(message_id, 2);
        assert_eq!(driver.statistics().messages_originated, 3);

        assert_eq!(driver.broadcast_message(Some(3)), Err(SimulationError::OutOfRange { node_id: 3, node_count: 3 }));
    }

    #[test]
    fn broadcast_on_empty_network_fails() {
        let mut driver = Driver::new(seeded(1), None);
        driver.remove_node();
        assert!(driver.broadcast_message(None).is_err());
        assert_eq!(driver.remove_node(), None);
    }

    #[test]
    fn stopping_freezes_pending_floods() {
        let mut driver = line_driver();
        // Converge (targets equal positions), then Rebuild.
        driver.tick();
        driver.tick();
        driver.broadcast_message(Some(0)).unwrap();
        driver.stop();

        for _ in 0..5 {
            driver.tick();
        }
        assert!(!driver.network().nodes()[1].seen_messages.contains(&0));

        driver.start();
        for _ in 0..10 {
            driver.tick();
        }
        assert!(driver.network().nodes()[2].seen_messages.contains(&0));
        assert_eq!(driver.statistics().flood.delivered, 2);
    }

    #[test]
    fn reset_restores_the_configured_network() {
        let mut driver = Driver::new(seeded(4), None);
        for _ in 0..30 {
            driver.tick();
        }
        driver.add_node();
        driver.reset();

        assert_eq!(driver.network().len(), 4);
        assert_eq!(driver.tick_count(), 0);
        assert_eq!(*driver.statistics(), DriverStatistics::default());
        assert_eq!(driver.upcoming_phase(), Phase::Scatter);
        assert_eq!(driver.network().pending_flood_events(), 0);
    }

    #[test]
    fn routing_table_queries_go_through_the_network() {
        let mut driver = line_driver();
        // Converge, Rebuild, BroadcastOgm
        for _ in 0..3 {
            driver.tick();
        }
        let rows = driver.routing_table(2).unwrap();
        assert_eq!(rows, vec![RouteRow { destination: 0, next_hop: 1, sequence: 1 }, RouteRow { destination: 1, next_hop: 1, sequence: 1 }]);
        assert!(driver.routing_table(7).is_err());
    }

    #[test]
    fn absorbed_logs_land_in_node_histories() {
        let mut driver = Driver::new(seeded(2), None);
        let entry = |node_id| CapturedLogEntry {
            node_id,
            timestamp: Instant::from_ticks(0),
            content: "hello".to_string(),
            level: LogLevel::Info,
        };

        let absorbed = driver.absorb_logs(vec![entry(1), entry(1), entry(9)]);

        assert_eq!(absorbed, 2);
        assert_eq!(driver.network().nodes()[1].log_history.len(), 2);
        assert!(driver.network().nodes()[0].log_history.is_empty());
    }

    #[test]
    fn reused_id_does_not_inherit_the_removed_nodes_logs() {
        let mut driver = line_driver().with_log_source(pending_logs);
        for _ in 0..3 {
            driver.tick();
        }
        capture(2, "Originating OGM seq 1 to 1 neighbors");
        capture(1, "OGM from origin 2 via 2 accepted (seq 1)");

        assert_eq!(driver.remove_node(), Some(2));
        assert_eq!(driver.add_node(), 2);
        driver.stop();
        driver.tick();

        assert!(history(&driver, 2).is_empty());
        assert_eq!(history(&driver, 1), vec!["OGM from origin 2 via 2 accepted (seq 1)"]);
    }

    #[test]
    fn lines_logged_before_an_add_stay_with_their_node() {
        let mut driver = line_driver().with_log_source(pending_logs);
        capture(0, "before add");
        driver.add_node();
        assert_eq!(history(&driver, 0), vec!["before add"]);
    }

    #[test]
    fn reset_discards_lines_from_the_old_network() {
        let mut driver = line_driver().with_log_source(pending_logs);
        driver.tick();
        capture(0, "from the old network");
        driver.reset();
        driver.tick();

        assert!(history(&driver, 0).is_empty());
    }
}
