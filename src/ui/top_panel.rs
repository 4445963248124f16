//! # Top Panel - Network Metrics and Controls
//!
//! This module renders the fixed-height top panel displaying:
//! - Column 1: Network state (tick, phase, node and edge counts)
//! - Column 2: Protocol totals (OGM rounds and broadcast message flooding)
//! - Column 3: Simulation controls (run state, topology edits, speed, zoom)

use crate::simulation::time_driver::{MAX_SPEED_PERCENT, MIN_SPEED_PERCENT, set_simulation_speed_percent};
use crate::ui::{AppState, UICommand};
use eframe::egui;

/// Render the top panel with metrics and controls.
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::TopBottomPanel::top("top_metrics").exact_height(150.0).show(ctx, |ui| {
        ui.columns(3, |cols| {
            cols[0].vertical(|ui| {
                render_network_state(ui, state);
            });
            cols[1].vertical(|ui| {
                render_protocol_totals(ui, state);
            });
            cols[2].vertical(|ui| {
                render_controls(ui, state);
            });
        });
    });
}

fn render_network_state(ui: &mut egui::Ui, state: &AppState) {
    ui.heading("Network");
    ui.separator();

    let Some(snapshot) = &state.snapshot else {
        ui.label("Waiting for simulation...");
        return;
    };

    ui.horizontal(|ui| {
        ui.label("Tick:");
        ui.label(egui::RichText::new(format!("{:<7}", snapshot.tick)).monospace().strong());
        ui.label("Sim time:");
        ui.label(egui::RichText::new(format!("{}s", embassy_time::Instant::now().as_secs())).monospace().strong());
    });
    ui.horizontal(|ui| {
        ui.label("Phase:");
        let phase = snapshot.last_phase.map_or_else(|| "-".to_string(), |p| p.to_string());
        ui.label(egui::RichText::new(phase).strong());
        ui.label("  next:");
        ui.label(egui::RichText::new(snapshot.upcoming_phase.to_string()).strong());
    });
    ui.horizontal(|ui| {
        ui.label("Nodes:");
        ui.label(egui::RichText::new(format!("{:<7}", snapshot.nodes.len())).monospace().strong());
        ui.label("Links:");
        ui.label(egui::RichText::new(snapshot.edge_count.to_string()).strong());
    });
    ui.horizontal(|ui| {
        ui.label("State:");
        if snapshot.running {
            ui.label(egui::RichText::new("Running").strong().color(egui::Color32::from_rgb(0, 160, 0)));
        } else {
            ui.label(egui::RichText::new("Stopped").strong().color(egui::Color32::from_rgb(200, 120, 0)));
        }
    });
}

fn render_protocol_totals(ui: &mut egui::Ui, state: &AppState) {
    ui.heading("Protocol totals");
    ui.separator();

    let Some(snapshot) = &state.snapshot else {
        return;
    };
    let ogm = &snapshot.statistics.ogm;
    let flood = &snapshot.statistics.flood;

    ui.horizontal(|ui| {
        ui.label("OGMs originated:");
        ui.label(egui::RichText::new(ogm.originated.to_string()).strong());
        ui.label("delivered:");
        ui.label(egui::RichText::new(ogm.delivered.to_string()).strong());
    });
    ui.horizontal(|ui| {
        ui.label("OGMs accepted:");
        ui.label(egui::RichText::new(ogm.accepted.to_string()).strong());
        ui.label("suppressed:");
        ui.label(egui::RichText::new(ogm.suppressed.to_string()).strong());
    });
    ui.horizontal(|ui| {
        ui.label("Messages:");
        ui.label(egui::RichText::new(snapshot.statistics.messages_originated.to_string()).strong());
        ui.label("deliveries:");
        ui.label(egui::RichText::new(flood.delivered.to_string()).strong());
        ui.label("duplicates:");
        ui.label(egui::RichText::new(flood.suppressed.to_string()).strong());
    });
    ui.horizontal(|ui| {
        ui.label("Pending flood events:");
        ui.label(egui::RichText::new(snapshot.pending_flood_events.to_string()).strong());
        if let Some((origin, message_id)) = state.last_broadcast {
            ui.label(format!("  last: #{} from {}", message_id, origin));
        }
    });
}

fn render_controls(ui: &mut egui::Ui, state: &mut AppState) {
    ui.heading("Controls");
    ui.separator();

    ui.horizontal(|ui| {
        if ui.button("Start").clicked() {
            state.send_command(UICommand::Start);
        }
        if ui.button("Stop").clicked() {
            state.send_command(UICommand::Stop);
        }
        if ui.button("Reset").clicked() {
            state.selected = None;
            state.node_info = None;
            state.send_command(UICommand::Reset);
        }
        if ui.button("Explain BATMAN").clicked() {
            state.show_explanation = true;
        }
    });
    ui.horizontal(|ui| {
        if ui.button("Add Node").clicked() {
            state.send_command(UICommand::AddNode);
        }
        if ui.button("Remove Node").clicked() {
            state.send_command(UICommand::RemoveNode);
        }
        let hover = if state.selected.is_some() {
            "Flood a message from the selected node"
        } else {
            "Flood a message from a random node"
        };
        if ui.button("Broadcast Message").on_hover_text(hover).clicked() {
            state.send_command(UICommand::BroadcastMessage(state.selected));
        }
    });
    ui.horizontal(|ui| {
        ui.label("Speed:");
        let mut speed = state.speed_percent as f64;
        let range = MIN_SPEED_PERCENT as f64..=MAX_SPEED_PERCENT as f64;
        if ui.add(egui::Slider::new(&mut speed, range).suffix("%")).changed() {
            state.speed_percent = set_simulation_speed_percent(speed.round() as u32);
        }
        if ui.button("1x").clicked() {
            state.speed_percent = set_simulation_speed_percent(100);
        }
    });
    ui.horizontal(|ui| {
        ui.label("Zoom:");
        if ui.button("+").clicked() {
            state.zoom_by(1.1);
        }
        if ui.button("-").clicked() {
            state.zoom_by(0.9);
        }
        ui.label(egui::RichText::new(format!("{:.0}%", state.zoom * 100.0)).monospace());
        ui.add_space(20.0);
        ui.checkbox(&mut state.show_node_ids, "Show node IDs");
    });
}
