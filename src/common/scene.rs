//! Scene loading, parsing, and validation logic.
//!
//! A scene pins the initial layout of a run instead of sampling random
//! positions. Node ids are implied by list order.
//!
//! ```json
//! { "nodes": [
//!     { "position": { "x": 100, "y": 100 }, "target_position": { "x": 400, "y": 300 } },
//!     { "position": { "x": 220, "y": 100 } }
//! ] }
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::simulation::geometry::WorldBounds;
use crate::simulation::types::{NodePlacement, Point};

/// Upper bound on scene size. Beyond this the O(n²) rebuild stalls the UI.
const MAX_NODES: usize = 10000;

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneNode {
    pub position: Point,
    #[serde(default)]
    pub target_position: Option<Point>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn placements(&self) -> Vec<NodePlacement> {
        self.nodes
            .iter()
            .map(|n| NodePlacement {
                position: n.position,
                target_position: n.target_position,
            })
            .collect()
    }
}

/// Load, parse and validate a scene file against the world bounds.
pub fn load_scene(path: &Path, bounds: &WorldBounds) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
        .map_err(|e| SceneLoadError::FileReadError(format!("{e:#}")))?;

    parse_scene(&data, bounds)
}

/// Parse and validate scene JSON.
pub fn parse_scene(data: &str, bounds: &WorldBounds) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{e:#}")))?;

    validate_scene(&scene, bounds).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Validate scene contents.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene, bounds: &WorldBounds) -> Result<(), String> {
    if scene.nodes.is_empty() {
        return Err("Scene must contain at least one node".to_string());
    }
    if scene.nodes.len() > MAX_NODES {
        return Err(format!("Node count {} exceeds maximum of {}", scene.nodes.len(), MAX_NODES));
    }

    for (index, node) in scene.nodes.iter().enumerate() {
        if !bounds.contains(&node.position) {
            return Err(format!(
                "Node {} position ({}, {}) outside world bounds ({}, {}) - ({}, {})",
                index, node.position.x, node.position.y, bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            ));
        }
        if let Some(target) = node.target_position {
            if !bounds.contains(&target) {
                return Err(format!("Node {} target position ({}, {}) outside world bounds", index, target.x, target.y));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nodes_with_optional_targets() {
        let scene = parse_scene(
            r#"{ "nodes": [
                { "position": { "x": 100, "y": 100 }, "target_position": { "x": 400, "y": 300 } },
                { "position": { "x": 220.5, "y": 100 } }
            ] }"#,
            &WorldBounds::default(),
        )
        .unwrap();

        let placements = scene.placements();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].target_position, Some(Point::new(400.0, 300.0)));
        assert_eq!(placements[1].position, Point::new(220.5, 100.0));
        assert_eq!(placements[1].target_position, None);
    }

    #[test]
    fn rejects_empty_scene() {
        let err = parse_scene(r#"{ "nodes": [] }"#, &WorldBounds::default()).unwrap_err();
        assert!(matches!(err, SceneLoadError::ValidationError(_)));
    }

    #[test]
    fn rejects_out_of_bounds_positions() {
        let err = parse_scene(r#"{ "nodes": [ { "position": { "x": 10, "y": 100 } } ] }"#, &WorldBounds::default()).unwrap_err();
        assert!(matches!(err, SceneLoadError::ValidationError(ref msg) if msg.contains("outside world bounds")));

        let err = parse_scene(
            r#"{ "nodes": [ { "position": { "x": 100, "y": 100 }, "target_position": { "x": 900, "y": 100 } } ] }"#,
            &WorldBounds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SceneLoadError::ValidationError(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_scene("{ nodes: ", &WorldBounds::default()).unwrap_err();
        assert!(matches!(err, SceneLoadError::ParseError(_)));
        assert!(err.to_string().starts_with("Failed to parse JSON"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_scene(Path::new("/nonexistent/scene.json"), &WorldBounds::default()).unwrap_err();
        assert!(matches!(err, SceneLoadError::FileReadError(_)));
    }
}
