//! # Application State Management
//!
//! This module implements the central `AppState` struct which manages all UI state
//! and coordinates the rendering of all UI components. It implements the `eframe::App`
//! trait to integrate with the egui application framework.
//!
//! ## Responsibilities
//!
//! - Holds the latest network snapshot and the inspected node's details
//! - Processes incoming messages from the simulation via `ui_refresh_rx`
//! - Sends user commands to the simulation via `ui_command_tx`
//! - Coordinates rendering of all UI panels (top, right, map)
//! - Persists display settings (node id labels, zoom) across sessions

use eframe::egui;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{NetworkSnapshot, NodeInfo, UICommand, UIRefreshState};
use crate::simulation::geometry::WorldBounds;
use crate::simulation::time_driver::get_simulation_speed_percent;
use crate::simulation::types::{MessageId, NodeId};

/// How often the inspected node's details are re-requested.
const NODE_INFO_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 8.0;

/// Currently selected tab in the right panel inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectorTab {
    #[default]
    RoutingTable,
    Neighbors,
    LogStream,
}

/// Central application state managing all UI components and simulation coordination.
pub struct AppState {
    /// Optional alert message to display in a modal dialog.
    pub alert: Option<String>,
    /// Receiver for UI refresh messages from the simulation.
    pub ui_refresh_rx: crate::UIRefreshQueueReceiver,
    /// Sender for commands from the UI to the simulation.
    pub ui_command_tx: crate::UICommandQueueSender,

    /// Latest published state of the whole network.
    pub snapshot: Option<NetworkSnapshot>,
    pub world_bounds: WorldBounds,
    /// Node clicked on the map, if any.
    pub selected: Option<NodeId>,
    /// Details for the selected node.
    pub node_info: Option<NodeInfo>,
    pub inspector_tab: InspectorTab,
    pub last_node_info_request: Instant,
    /// Most recent broadcast, shown in the top panel.
    pub last_broadcast: Option<(NodeId, MessageId)>,

    /// Simulation speed as a percentage (100 = real-time).
    pub speed_percent: u32,
    pub show_node_ids: bool,
    /// Map scale around the world center; 1.0 fits the world to the panel.
    pub zoom: f32,
    pub show_explanation: bool,
    /// Substring filter for the log stream tab.
    pub log_filter: String,
}

/// Settings persisted across application sessions.
#[derive(Default, Serialize, Deserialize)]
struct PersistedSettings {
    show_node_ids: Option<bool>,
    zoom: Option<f32>,
}

impl AppState {
    /// Create a new AppState, loading persisted settings if available.
    pub fn new(rx: crate::UIRefreshQueueReceiver, tx: crate::UICommandQueueSender, storage: Option<&dyn eframe::Storage>) -> Self {
        let persisted: PersistedSettings = storage.and_then(|s| eframe::get_value(s, "app_settings")).unwrap_or_default();

        Self {
            alert: None,
            ui_refresh_rx: rx,
            ui_command_tx: tx,
            snapshot: None,
            world_bounds: WorldBounds::default(),
            selected: None,
            node_info: None,
            inspector_tab: InspectorTab::default(),
            last_node_info_request: Instant::now(),
            last_broadcast: None,
            speed_percent: get_simulation_speed_percent(),
            show_node_ids: persisted.show_node_ids.unwrap_or(true),
            zoom: persisted.zoom.unwrap_or(1.0).clamp(MIN_ZOOM, MAX_ZOOM),
            show_explanation: false,
            log_filter: String::new(),
        }
    }

    pub fn send_command(&self, command: UICommand) {
        if self.ui_command_tx.try_send(command).is_err() {
            log::warn!("UI command queue full, dropping {:?}", command);
        }
    }

    /// Select `node_id`, or clear the selection if it is already selected.
    pub fn toggle_selection(&mut self, node_id: NodeId) {
        if self.selected == Some(node_id) {
            self.selected = None;
            self.node_info = None;
        } else {
            self.selected = Some(node_id);
            self.node_info = None;
            self.last_node_info_request = Instant::now();
            self.send_command(UICommand::RequestNodeInfo(node_id));
        }
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn apply_refresh(&mut self, msg: UIRefreshState) {
        match msg {
            UIRefreshState::Alert(alert_msg) => {
                self.alert = Some(alert_msg);
            }
            UIRefreshState::WorldBoundsUpdated(bounds) => {
                self.world_bounds = bounds;
            }
            UIRefreshState::NetworkUpdated(snapshot) => {
                self.snapshot = Some(snapshot);
            }
            UIRefreshState::NodeInfo(node_info) => {
                // Late answers for a previous selection are ignored.
                if self.selected == Some(node_info.node_id) {
                    self.node_info = Some(node_info);
                }
            }
            UIRefreshState::NodeInfoUnavailable(node_id) => {
                if self.selected == Some(node_id) {
                    self.selected = None;
                    self.node_info = None;
                }
            }
            UIRefreshState::MessageBroadcast(origin, message_id) => {
                self.last_broadcast = Some((origin, message_id));
            }
        }
    }
}

/// Short description shown by the "Explain BATMAN" button.
const BATMAN_EXPLANATION: &str = "B.A.T.M.A.N. (Better Approach To Mobile Adhoc Networking) is a proactive \
routing protocol for mesh networks.\n\n\
Every node periodically broadcasts an Originator Message (OGM) carrying its id and a sequence number. \
Neighbors rebroadcast OGMs they have not seen before. A node never learns the full path to a destination: \
it only remembers through which neighbor the freshest OGM of that originator arrived, and uses that \
neighbor as the next hop.\n\n\
Blue nodes are idle, red nodes are transmitting a broadcast message and green nodes have received it.";

impl eframe::App for AppState {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            show_node_ids: Some(self.show_node_ids),
            zoom: Some(self.zoom),
        };
        eframe::set_value(storage, "app_settings", &settings);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Repaint periodically so background updates are visible without input
        ctx.request_repaint_after(Duration::from_millis(20));

        if let Some(node_id) = self.selected {
            if self.last_node_info_request.elapsed() > NODE_INFO_REFRESH_INTERVAL {
                self.last_node_info_request = Instant::now();
                self.send_command(UICommand::RequestNodeInfo(node_id));
            }
        }

        while let Ok(msg) = self.ui_refresh_rx.try_receive() {
            self.apply_refresh(msg);
        }

        if let Some(alert_msg) = self.alert.clone() {
            egui::Window::new("Alert")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(20.0);
                        ui.label(alert_msg);
                        ui.add_space(20.0);

                        if ui.button("OK").clicked() {
                            self.alert = None;
                        }
                        ui.add_space(10.0);
                    });
                });
        }

        if self.show_explanation {
            let mut open = true;
            egui::Window::new("What is B.A.T.M.A.N.?")
                .collapsible(false)
                .resizable(false)
                .default_width(420.0)
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(BATMAN_EXPLANATION);
                });
            self.show_explanation = open;
        }

        // Panels layout: top (fixed), right (fixed), map fills the remaining using CentralPanel
        super::top_panel::render(ctx, self);
        super::right_panel::render(ctx, self);
        super::map::render(ctx, self);
    }
}
