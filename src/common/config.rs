//! Simulation configuration loaded from an optional TOML file.
//!
//! Every key is optional; a missing file or key falls back to the defaults
//! below. Keys use kebab-case, e.g.:
//!
//! ```toml
//! node-count = 12
//! adjacency-policy = "random-distant"
//! link-probability = 0.25
//! tick-interval-ms = 100
//! scene-file = "scenes/ring.json"
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::simulation::geometry::WorldBounds;
use crate::simulation::topology::AdjacencyPolicy;

/// File looked up in the working directory when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Which link predicate the topology builder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjacencyPolicyKind {
    #[default]
    Proximity,
    RandomDistant,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    pub node_count: usize,
    pub world_min_x: f64,
    pub world_min_y: f64,
    pub world_max_x: f64,
    pub world_max_y: f64,
    pub min_distance: f64,
    /// Fraction of the vector toward the attractor covered per mobility step.
    pub speed: f64,
    pub adjacency_policy: AdjacencyPolicyKind,
    pub proximity_factor: f64,
    pub link_probability: f64,
    pub tick_interval_ms: u64,
    /// Consecutive scatter ticks at the start of each cycle.
    pub scatter_ticks: u32,
    pub flood_forward_delay_ticks: u64,
    pub flood_reset_delay_ticks: u64,
    pub seed: Option<u64>,
    /// JSON scene pinning the initial layout. Relative to the config file.
    pub scene_file: Option<PathBuf>,
    /// env_logger filter directives, e.g. `"info,batman_mesh_simulator=trace"`.
    pub log_filter: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let bounds = WorldBounds::default();
        Self {
            node_count: 10,
            world_min_x: bounds.min_x,
            world_min_y: bounds.min_y,
            world_max_x: bounds.max_x,
            world_max_y: bounds.max_y,
            min_distance: 100.0,
            speed: 0.005,
            adjacency_policy: AdjacencyPolicyKind::Proximity,
            proximity_factor: 1.5,
            link_probability: 0.3,
            tick_interval_ms: 200,
            scatter_ticks: 10,
            flood_forward_delay_ticks: 1,
            flood_reset_delay_ticks: 3,
            seed: None,
            scene_file: None,
            log_filter: None,
        }
    }
}

impl SimulationConfig {
    /// Load and validate a configuration file.
    ///
    /// A relative `scene-file` is resolved against the config file's directory.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path).with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        let mut config: SimulationConfig = toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        if let Some(scene) = config.scene_file.take() {
            let resolved = if scene.is_relative() {
                config_path.parent().unwrap_or(Path::new(".")).join(scene)
            } else {
                scene
            };
            config.scene_file = Some(resolved);
        }

        config.validate().map_err(anyhow::Error::msg).context("Invalid configuration")?;
        Ok(config)
    }

    /// Pick the configuration file for this run.
    ///
    /// The first command-line argument wins; otherwise `config.toml` in the
    /// working directory is used if it exists.
    pub fn resolve_path(cli_argument: Option<String>) -> Option<PathBuf> {
        match cli_argument {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            }
        }
    }

    /// Reject values that would make the simulation meaningless or panic.
    ///
    /// # Returns
    ///
    /// `Ok(())` if validation passes, `Err(String)` describing the first problem otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_count == 0 {
            return Err("node-count must be at least 1".to_string());
        }
        let coordinates = [self.world_min_x, self.world_min_y, self.world_max_x, self.world_max_y];
        if coordinates.iter().any(|c| !c.is_finite()) {
            return Err("World bounds must be finite".to_string());
        }
        if self.world_min_x >= self.world_max_x || self.world_min_y >= self.world_max_y {
            return Err(format!(
                "World bounds are empty or inverted: ({}, {}) - ({}, {})",
                self.world_min_x, self.world_min_y, self.world_max_x, self.world_max_y
            ));
        }
        if !(self.min_distance > 0.0) {
            return Err(format!("min-distance must be positive, got {}", self.min_distance));
        }
        if !(self.speed > 0.0 && self.speed <= 1.0) {
            return Err(format!("speed must be in (0, 1], got {}", self.speed));
        }
        if !(self.proximity_factor > 0.0) {
            return Err(format!("proximity-factor must be positive, got {}", self.proximity_factor));
        }
        if !(0.0..=1.0).contains(&self.link_probability) {
            return Err(format!("link-probability must be in [0, 1], got {}", self.link_probability));
        }
        if self.tick_interval_ms == 0 {
            return Err("tick-interval-ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn world_bounds(&self) -> WorldBounds {
        WorldBounds::new(self.world_min_x, self.world_min_y, self.world_max_x, self.world_max_y)
    }

    pub fn adjacency_policy(&self) -> AdjacencyPolicy {
        match self.adjacency_policy {
            AdjacencyPolicyKind::Proximity => AdjacencyPolicy::Proximity { factor: self.proximity_factor },
            AdjacencyPolicyKind::RandomDistant => AdjacencyPolicy::RandomDistant {
                probability: self.link_probability,
            },
        }
    }
}
