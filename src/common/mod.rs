//! Loading of run inputs: the TOML configuration and optional JSON scene.

pub mod config;
pub mod scene;
