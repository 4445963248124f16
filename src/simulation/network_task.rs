//! Simulation task bridging the driver and the UI.
//!
//! Each loop iteration waits for either a UI command or the next tick
//! deadline. A tick runs one driver step and publishes a fresh snapshot;
//! commands are applied between ticks, so they never interleave with a phase.
//! Tick deadlines are embassy-time instants, so the speed slider scales the
//! cadence through the time driver.

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};

use crate::common::config::SimulationConfig;
use crate::common::scene::load_scene;
use crate::ui::{NetworkSnapshot, NodeInfo, NodeUIState, UICommand, UIRefreshState};
use crate::{UICommandQueueReceiver, UIRefreshQueueSender};

use super::driver::Driver;
use super::types::{NodeId, NodePlacement, Phase};

/// Driver plus the bits of presentation state the snapshots need.
#[derive(Debug)]
pub struct Session {
    driver: Driver,
    last_phase: Option<Phase>,
}

impl Session {
    pub fn new(driver: Driver) -> Self {
        Self { driver, last_phase: None }
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Run one driver tick and return the snapshot to publish.
    pub fn tick(&mut self) -> NetworkSnapshot {
        let report = self.driver.tick();
        if let Some(phase) = report.phase {
            log::trace!(
                "Tick {}: {} -> {:?}, flood {:?}, {} log lines absorbed",
                report.tick,
                phase,
                report.outcome,
                report.flood,
                report.logs_absorbed
            );
            self.last_phase = Some(phase);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let network = self.driver.network();
        NetworkSnapshot {
            tick: self.driver.tick_count(),
            running: self.driver.is_running(),
            last_phase: self.last_phase,
            upcoming_phase: self.driver.upcoming_phase(),
            nodes: network
                .nodes()
                .iter()
                .map(|n| NodeUIState {
                    node_id: n.node_id,
                    position: n.position,
                    neighbors: n.neighbors.iter().copied().collect(),
                    display_state: n.display_state,
                })
                .collect(),
            edge_count: network.edge_count(),
            pending_flood_events: network.pending_flood_events(),
            statistics: *self.driver.statistics(),
        }
    }

    /// Inspector details for `node_id`, or `NodeInfoUnavailable` if it is gone.
    pub fn node_info(&self, node_id: NodeId) -> UIRefreshState {
        let lookup = self.driver.network().node(node_id).and_then(|node| Ok((node, self.driver.routing_table(node_id)?)));
        let (node, routes) = match lookup {
            Ok(found) => found,
            Err(err) => {
                log::debug!("Node info request rejected: {}", err);
                return UIRefreshState::NodeInfoUnavailable(node_id);
            }
        };
        UIRefreshState::NodeInfo(NodeInfo {
            node_id,
            position: node.position,
            target_position: node.target_position,
            origin_sequence: node.origin_sequence,
            neighbors: node.neighbors.iter().copied().collect(),
            routes,
            log_lines: node.log_history.iter().cloned().collect(),
        })
    }

    /// Apply a UI command.
    ///
    /// # Returns
    ///
    /// Messages for the UI. Commands that change the network are followed by a
    /// fresh snapshot so the map does not wait for the next tick.
    pub fn handle_command(&mut self, command: UICommand) -> Vec<UIRefreshState> {
        match command {
            UICommand::Start => self.driver.start(),
            UICommand::Stop => self.driver.stop(),
            UICommand::Reset => {
                self.driver.reset();
                self.last_phase = None;
            }
            UICommand::AddNode => {
                let node_id = self.driver.add_node();
                log::info!("Added node {}", node_id);
            }
            UICommand::RemoveNode => {
                if self.driver.remove_node().is_none() {
                    log::info!("Remove requested on an empty network");
                }
            }
            UICommand::BroadcastMessage(origin) => match self.driver.broadcast_message(origin) {
                Ok((origin, message_id)) => {
                    log::info!("Broadcasting message {} from node {}", message_id, origin);
                    return vec![UIRefreshState::MessageBroadcast(origin, message_id), UIRefreshState::NetworkUpdated(self.snapshot())];
                }
                Err(err) => {
                    log::warn!("Broadcast rejected: {}", err);
                    return vec![UIRefreshState::Alert(format!("Cannot broadcast: {}", err))];
                }
            },
            UICommand::RequestNodeInfo(node_id) => return vec![self.node_info(node_id)],
        }
        vec![UIRefreshState::NetworkUpdated(self.snapshot())]
    }
}

/// Scene placements for this run, or `None` to sample a random layout.
///
/// A scene that fails to load is reported through `alert` and ignored.
fn initial_placements(config: &SimulationConfig, alert: &mut Option<String>) -> Option<Vec<NodePlacement>> {
    let path = config.scene_file.as_ref()?;
    match load_scene(path, &config.world_bounds()) {
        Ok(scene) => {
            log::info!("Loaded scene {} with {} nodes", path.display(), scene.nodes.len());
            Some(scene.placements())
        }
        Err(err) => {
            log::error!("Error loading scene file {}: {}", path.display(), err);
            *alert = Some(format!("Error loading scene file {}: {}\nUsing {} random nodes instead.", path.display(), err, config.node_count));
            None
        }
    }
}

fn publish(ui_refresh_tx: &UIRefreshQueueSender, msg: UIRefreshState) {
    if let Err(err) = ui_refresh_tx.try_send(msg) {
        log::trace!("UI refresh queue full, dropping update: {:?}", err);
    }
}

#[embassy_executor::task]
pub async fn network_task(config: SimulationConfig, ui_refresh_tx: UIRefreshQueueSender, ui_command_rx: UICommandQueueReceiver) {
    let mut alert = None;
    let placements = initial_placements(&config, &mut alert);
    if let Some(alert) = alert {
        ui_refresh_tx.send(UIRefreshState::Alert(alert)).await;
    }

    let mut session = Session::new(Driver::new(config, placements));
    let tick_interval = Duration::from_millis(session.driver().config().tick_interval_ms);
    ui_refresh_tx.send(UIRefreshState::WorldBoundsUpdated(session.driver().network().bounds())).await;
    log::info!("Simulation running with {} nodes, tick every {} ms", session.driver().network().len(), tick_interval.as_millis());
    ui_refresh_tx.send(UIRefreshState::NetworkUpdated(session.snapshot())).await;

    let mut next_tick = Instant::now() + tick_interval;
    loop {
        match select(ui_command_rx.receive(), Timer::at(next_tick)).await {
            Either::First(command) => {
                log::debug!("UI command: {:?}", command);
                for msg in session.handle_command(command) {
                    publish(&ui_refresh_tx, msg);
                }
            }
            Either::Second(()) => {
                // Skip missed deadlines instead of bursting through them.
                next_tick = (next_tick + tick_interval).max(Instant::now());
                publish(&ui_refresh_tx, UIRefreshState::NetworkUpdated(session.tick()));
            }
        }
    }
}
