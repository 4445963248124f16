//! Error conditions raised by the simulation core.

use super::types::NodeId;

/// Errors reported by network queries and consistency checks.
///
/// None of these are fatal: a failing query is aborted and the simulation
/// state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// A node id outside the current `0..node_count` range was requested.
    OutOfRange { node_id: NodeId, node_count: usize },
    /// A routing entry or neighbor set still names a node that no longer exists.
    StaleReference { node_id: NodeId, referenced: NodeId },
    /// `a` lists `b` as a neighbor but not the other way around.
    AsymmetricLink { a: NodeId, b: NodeId },
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::OutOfRange { node_id, node_count } => {
                write!(f, "Node {} out of range (network has {} nodes)", node_id, node_count)
            }
            SimulationError::StaleReference { node_id, referenced } => {
                write!(f, "Node {} references removed node {}", node_id, referenced)
            }
            SimulationError::AsymmetricLink { a, b } => write!(f, "Link {} -> {} has no reverse edge", a, b),
        }
    }
}

impl std::error::Error for SimulationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_both_values() {
        let err = SimulationError::OutOfRange { node_id: 12, node_count: 4 };
        assert_eq!(err.to_string(), "Node 12 out of range (network has 4 nodes)");
    }
}
