//! Mesh simulation core module.
//!
//! Simulates a B.A.T.M.A.N.-style mobile mesh: nodes move through a bounded
//! world, link to nearby peers, learn next hops from periodic originator
//! messages (OGMs) and flood application messages with duplicate suppression.
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (Node, routes, phases, log entries)
//! - `error`: Error conditions reported by network queries
//! - `geometry`: Distances, movement steps and world bounds
//! - `mobility`: Scatter, converge and depart movement
//! - `topology`: Neighbor graph rebuild under an adjacency policy
//! - `routing`: OGM reception and breadth-first broadcast rounds
//! - `flood`: Tick-based application message dissemination
//! - `network`: Node arena tying the engines together
//! - `driver`: Phase schedule, run state and statistics
//! - `network_task`: Embassy task bridging the driver and the UI
//! - `log_capture`: Per-node capture of protocol log lines
//! - `time_driver`: Speed-scaled embassy-time driver
//!
//! ## Public API
//!
//! The main entry point is `network_task`, which should be spawned by the
//! Embassy executor. Tests and tools can drive a [`Driver`] directly.

pub mod driver;
pub mod error;
pub mod flood;
pub mod geometry;
pub mod log_capture;
pub mod mobility;
pub mod network;
pub mod network_task;
pub mod routing;
pub mod time_driver;
pub mod topology;
pub mod types;

// Re-export the main network task for convenience
pub use network_task::network_task;

