//! # Right Panel - Node Inspector
//!
//! Shows the node selected on the map: id, position, target, and three tabs:
//! - Routing Table: `destination, next hop, sequence` rows
//! - Neighbors: the node's current symmetric links
//! - Log Stream: protocol log lines captured for this node, newest first
//!
//! Tables use `egui_extras::TableBuilder`, which only builds visible rows.

use crate::simulation::types::LogLevel;
use crate::ui::app_state::InspectorTab;
use crate::ui::{AppState, NodeInfo};
use eframe::egui;
use egui::Color32;
use egui_extras::{Column, TableBuilder};

pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::SidePanel::right("inspector_right").exact_width(420.0).show(ctx, |ui| {
        ui.heading("Inspector");
        ui.separator();

        let Some(node_id) = state.selected else {
            ui.centered_and_justified(|ui| {
                ui.label("No node selected. Click on a node on the map to select it.");
            });
            return;
        };

        ui.horizontal(|ui| {
            ui.label("Selected Node:");
            ui.label(egui::RichText::new(format!("#{}", node_id)).strong().color(Color32::from_rgb(0, 128, 255)));
        });

        // Detach the node info so the tab widgets can borrow `state` mutably.
        let Some(node_info) = state.node_info.take() else {
            ui.label("Loading...");
            return;
        };

        ui.horizontal(|ui| {
            ui.label("Position: (");
            ui.label(egui::RichText::new(format!("{:.1}", node_info.position.x)).strong());
            ui.label(",");
            ui.label(egui::RichText::new(format!("{:.1}", node_info.position.y)).strong());
            ui.label(")");
        });
        ui.horizontal(|ui| {
            ui.label("Target: (");
            ui.label(egui::RichText::new(format!("{:.1}", node_info.target_position.x)).strong());
            ui.label(",");
            ui.label(egui::RichText::new(format!("{:.1}", node_info.target_position.y)).strong());
            ui.label(")");
        });
        ui.horizontal(|ui| {
            ui.label("OGM sequence:");
            ui.label(egui::RichText::new(node_info.origin_sequence.to_string()).strong());
            ui.label("  Routes:");
            ui.label(egui::RichText::new(node_info.routes.len().to_string()).strong());
        });

        ui.separator();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut state.inspector_tab, InspectorTab::RoutingTable, "Routing Table");
            ui.selectable_value(&mut state.inspector_tab, InspectorTab::Neighbors, "Neighbors");
            ui.selectable_value(&mut state.inspector_tab, InspectorTab::LogStream, "Log Stream");
        });
        ui.add_space(4.0);

        let table_h = ui.available_height().max(0.0);
        match state.inspector_tab {
            InspectorTab::RoutingTable => render_routing_table(ui, &node_info, table_h),
            InspectorTab::Neighbors => render_neighbors(ui, state, &node_info),
            InspectorTab::LogStream => render_log_stream(ui, state, &node_info),
        }

        // Keep it unless the selection changed during this frame.
        if state.node_info.is_none() && state.selected == Some(node_info.node_id) {
            state.node_info = Some(node_info);
        }
    });
}

fn render_routing_table(ui: &mut egui::Ui, node_info: &NodeInfo, table_h: f32) {
    if node_info.routes.is_empty() {
        ui.label("No routes yet. Routes are learned during the OGM broadcast phase.");
        return;
    }

    let row_height = ui.text_style_height(&egui::TextStyle::Body) * 1.3;
    let body_min_h = (table_h - row_height).max(0.0);

    TableBuilder::new(ui)
        .striped(true)
        .vscroll(true)
        .min_scrolled_height(body_min_h)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::initial(100.0).at_least(60.0)) // Destination
        .column(Column::initial(100.0).at_least(60.0)) // Next hop
        .column(Column::remainder()) // Sequence
        .header(row_height, |mut header| {
            header.col(|ui| {
                ui.strong("Destination");
            });
            header.col(|ui| {
                ui.strong("Next hop");
            });
            header.col(|ui| {
                ui.strong("Sequence");
            });
        })
        .body(|body| {
            body.rows(row_height, node_info.routes.len(), |mut row| {
                let route = &node_info.routes[row.index()];
                // Direct neighbors route through themselves.
                let color = if route.destination == route.next_hop {
                    Color32::LIGHT_GREEN
                } else {
                    Color32::LIGHT_BLUE
                };
                row.col(|ui| {
                    ui.colored_label(color, format!("#{}", route.destination));
                });
                row.col(|ui| {
                    ui.colored_label(color, format!("#{}", route.next_hop));
                });
                row.col(|ui| {
                    ui.label(route.sequence.to_string());
                });
            });
        });
}

fn render_neighbors(ui: &mut egui::Ui, state: &mut AppState, node_info: &NodeInfo) {
    if node_info.neighbors.is_empty() {
        ui.label("This node has no neighbors.");
        return;
    }
    ui.label(format!("{} neighbors (click to inspect):", node_info.neighbors.len()));
    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.horizontal_wrapped(|ui| {
            for &neighbor in &node_info.neighbors {
                if ui.button(format!("#{}", neighbor)).clicked() {
                    state.toggle_selection(neighbor);
                }
            }
        });
    });
}

fn render_log_stream(ui: &mut egui::Ui, state: &mut AppState, node_info: &NodeInfo) {
    ui.horizontal(|ui| {
        ui.label("Filter:");
        ui.text_edit_singleline(&mut state.log_filter);
    });

    let filter = state.log_filter.to_lowercase();
    // Newest first
    let lines: Vec<_> = node_info
        .log_lines
        .iter()
        .rev()
        .filter(|line| filter.is_empty() || line.content.to_lowercase().contains(&filter))
        .collect();

    let row_height = ui.text_style_height(&egui::TextStyle::Body) * 1.3;
    let body_min_h = (ui.available_height() - row_height).max(0.0);

    TableBuilder::new(ui)
        .striped(true)
        .vscroll(true)
        .min_scrolled_height(body_min_h)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::initial(60.0).at_least(40.0)) // Time
        .column(Column::initial(55.0).at_least(40.0)) // Level
        .column(Column::remainder()) // Log content
        .header(row_height, |mut header| {
            header.col(|ui| {
                ui.strong("Time");
            });
            header.col(|ui| {
                ui.strong("Level");
            });
            header.col(|ui| {
                ui.strong("Log");
            });
        })
        .body(|body| {
            body.rows(row_height, lines.len(), |mut row| {
                let log_line = lines[row.index()];

                let color = match log_line.level {
                    LogLevel::Error => Color32::RED,
                    LogLevel::Warn => Color32::YELLOW,
                    LogLevel::Info => Color32::WHITE,
                    LogLevel::Debug | LogLevel::Trace => Color32::GRAY,
                };
                let time_string = format!("{} s", log_line.timestamp.as_secs());

                row.col(|ui| {
                    ui.colored_label(color, &time_string);
                });
                row.col(|ui| {
                    ui.colored_label(color, log_line.level.to_string());
                });
                row.col(|ui| {
                    ui.colored_label(color, &log_line.content);
                });
            });
        });
}
