//! # Central Map Visualization
//!
//! Renders the world as seen by the simulation:
//! - A grid over the world bounds
//! - Neighbor links as line segments
//! - Nodes as circles coloured by display state (idle blue, transmitting red,
//!   received green) with optional ID labels
//! - The selected node with a highlight ring and its links emphasised
//!
//! ## Coordinate Mapping
//!
//! World coordinates are fitted into the panel keeping the world's aspect ratio.
//! Zoom scales around the world center, so zooming in crops the edges of the world.
//!
//! ## Node Selection
//!
//! Clicking selects the nearest node within a small pick radius; clicking the
//! selected node again deselects it.

use crate::simulation::geometry::WorldBounds;
use crate::simulation::types::{DisplayState, NodeId, Point};
use crate::ui::{AppState, NodeUIState};
use eframe::egui;
use egui::Color32;
use std::collections::HashMap;

const NODE_RADIUS: f32 = 6.0;
/// Clicks farther than this from every node are ignored.
const PICK_RADIUS: f32 = 20.0;

/// Maps world coordinates into a screen rectangle.
#[derive(Debug, Clone, Copy)]
pub struct MapTransform {
    rect: egui::Rect,
    bounds: WorldBounds,
    /// Pixels per world unit, including zoom.
    scale: f32,
}

impl MapTransform {
    pub fn new(rect: egui::Rect, bounds: WorldBounds, zoom: f32) -> Self {
        let width = bounds.width().max(f64::EPSILON) as f32;
        let height = bounds.height().max(f64::EPSILON) as f32;
        let fit = (rect.width() / width).min(rect.height() / height);
        Self {
            rect,
            bounds,
            scale: fit * zoom,
        }
    }

    fn world_center(&self) -> Point {
        Point::new((self.bounds.min_x + self.bounds.max_x) / 2.0, (self.bounds.min_y + self.bounds.max_y) / 2.0)
    }

    pub fn to_screen(&self, p: &Point) -> egui::Pos2 {
        let c = self.world_center();
        self.rect.center() + egui::vec2((p.x - c.x) as f32 * self.scale, (p.y - c.y) as f32 * self.scale)
    }

    /// Screen rectangle covered by the world bounds.
    pub fn world_rect(&self) -> egui::Rect {
        egui::Rect::from_two_pos(
            self.to_screen(&Point::new(self.bounds.min_x, self.bounds.min_y)),
            self.to_screen(&Point::new(self.bounds.max_x, self.bounds.max_y)),
        )
    }
}

pub fn color_for_display_state(state: DisplayState) -> Color32 {
    match state {
        DisplayState::Idle => Color32::from_rgb(40, 120, 255),
        DisplayState::Transmitting => Color32::from_rgb(230, 40, 40),
        DisplayState::Received => Color32::from_rgb(0, 200, 80),
    }
}

/// Render the central map panel.
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let rect = ui.available_rect_before_wrap();
        let response = ui.interact(rect, egui::Id::new("map_canvas"), egui::Sense::click());
        let painter = ui.painter_at(rect);
        let transform = MapTransform::new(rect.shrink(10.0), state.world_bounds, state.zoom);

        painter.rect_filled(rect, 4.0, ui.visuals().extreme_bg_color);
        draw_grid(&painter, &transform, &state.world_bounds);

        let Some(snapshot) = &state.snapshot else {
            painter.text(rect.center(), egui::Align2::CENTER_CENTER, "Starting simulation...", egui::FontId::proportional(16.0), Color32::GRAY);
            return;
        };

        let positions: HashMap<NodeId, egui::Pos2> = snapshot.nodes.iter().map(|n| (n.node_id, transform.to_screen(&n.position))).collect();

        draw_links(&painter, &snapshot.nodes, &positions, state.selected);
        draw_nodes(&painter, &snapshot.nodes, &positions, state.selected, state.show_node_ids);

        if response.clicked() {
            if let Some(click_pos) = response.interact_pointer_pos() {
                if let Some(node_id) = pick_node(&positions, click_pos) {
                    state.toggle_selection(node_id);
                }
            }
        }
    });
}

/// Draw a grid with square cells; the longer world side is split into 10 cells.
fn draw_grid(painter: &egui::Painter, transform: &MapTransform, bounds: &WorldBounds) {
    let grid_stroke = egui::Stroke::new(1.0, Color32::from_rgb(0, 0, 100));
    let world_rect = transform.world_rect();
    let corners = vec![world_rect.left_top(), world_rect.right_top(), world_rect.right_bottom(), world_rect.left_bottom()];
    painter.add(egui::Shape::closed_line(corners, egui::Stroke::new(1.5, Color32::from_rgb(0, 0, 160))));

    let spacing = bounds.width().max(bounds.height()) / 10.0;
    if spacing <= 0.0 {
        return;
    }

    let mut x = bounds.min_x + spacing;
    while x < bounds.max_x {
        let top = transform.to_screen(&Point::new(x, bounds.min_y));
        let bottom = transform.to_screen(&Point::new(x, bounds.max_y));
        painter.line_segment([top, bottom], grid_stroke);
        x += spacing;
    }
    let mut y = bounds.min_y + spacing;
    while y < bounds.max_y {
        let left = transform.to_screen(&Point::new(bounds.min_x, y));
        let right = transform.to_screen(&Point::new(bounds.max_x, y));
        painter.line_segment([left, right], grid_stroke);
        y += spacing;
    }
}

fn draw_links(painter: &egui::Painter, nodes: &[NodeUIState], positions: &HashMap<NodeId, egui::Pos2>, selected: Option<NodeId>) {
    let link_stroke = egui::Stroke::new(1.0, Color32::from_gray(110));
    let selected_stroke = egui::Stroke::new(2.0, Color32::from_rgb(255, 200, 0));

    for node in nodes {
        let Some(&from) = positions.get(&node.node_id) else {
            continue;
        };
        // Each undirected link is drawn once, from its lower id end.
        for &neighbor in node.neighbors.iter().filter(|&&n| n > node.node_id) {
            if let Some(&to) = positions.get(&neighbor) {
                let stroke = if selected == Some(node.node_id) || selected == Some(neighbor) {
                    selected_stroke
                } else {
                    link_stroke
                };
                painter.line_segment([from, to], stroke);
            }
        }
    }
}

fn draw_nodes(painter: &egui::Painter, nodes: &[NodeUIState], positions: &HashMap<NodeId, egui::Pos2>, selected: Option<NodeId>, show_node_ids: bool) {
    for node in nodes {
        let Some(&pos) = positions.get(&node.node_id) else {
            continue;
        };
        if selected == Some(node.node_id) {
            painter.circle_stroke(pos, NODE_RADIUS + 4.0, egui::Stroke::new(2.0, Color32::from_rgb(255, 200, 0)));
        }
        painter.circle_filled(pos, NODE_RADIUS, color_for_display_state(node.display_state));

        if show_node_ids {
            painter.text(
                egui::pos2(pos.x + 8.0, pos.y - 8.0),
                egui::Align2::LEFT_BOTTOM,
                format!("#{}", node.node_id),
                egui::FontId::monospace(12.0),
                Color32::from_rgb(40, 200, 255),
            );
        }
    }
}

/// Nearest node to `click_pos` within [`PICK_RADIUS`].
fn pick_node(positions: &HashMap<NodeId, egui::Pos2>, click_pos: egui::Pos2) -> Option<NodeId> {
    positions
        .iter()
        .map(|(&node_id, pos)| (node_id, pos.distance_sq(click_pos)))
        .filter(|&(_, d2)| d2 <= PICK_RADIUS * PICK_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(node_id, _)| node_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 400.0))
    }

    #[test]
    fn world_is_fitted_and_centered() {
        // 700 x 500 world into 800 x 400: height limits the scale.
        let transform = MapTransform::new(screen(), WorldBounds::new(50.0, 50.0, 750.0, 550.0), 1.0);

        let center = transform.to_screen(&Point::new(400.0, 300.0));
        assert_eq!(center, egui::pos2(400.0, 200.0));

        let world = transform.world_rect();
        assert!((world.height() - 400.0).abs() < 1e-3);
        assert!((world.width() - 560.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_scales_around_the_world_center() {
        let bounds = WorldBounds::new(0.0, 0.0, 100.0, 100.0);
        let plain = MapTransform::new(screen(), bounds, 1.0);
        let zoomed = MapTransform::new(screen(), bounds, 2.0);

        let corner = Point::new(0.0, 0.0);
        let plain_offset = plain.to_screen(&corner) - screen().center();
        let zoomed_offset = zoomed.to_screen(&corner) - screen().center();
        assert_eq!(zoomed_offset, plain_offset * 2.0);
    }

    #[test]
    fn picking_prefers_the_nearest_node_in_range() {
        let positions = HashMap::from([(0, egui::pos2(100.0, 100.0)), (1, egui::pos2(110.0, 100.0)), (2, egui::pos2(300.0, 300.0))]);

        assert_eq!(pick_node(&positions, egui::pos2(107.0, 101.0)), Some(1));
        assert_eq!(pick_node(&positions, egui::pos2(98.0, 100.0)), Some(0));
        assert_eq!(pick_node(&positions, egui::pos2(200.0, 200.0)), None);
    }
}
