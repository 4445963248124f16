//! Node mobility for the three movement phases.
//!
//! - **Scatter**: a collision-avoiding random walk. A node proposes a small step
//!   toward a freshly sampled point and the proposal is rejected outright if it
//!   would land within `min_distance` of any other node's current position.
//! - **Converge**: a step toward the node's fixed target position.
//! - **Depart**: the scatter step without the collision check.
//!
//! A rejected scatter move is not retried; the next tick samples a new point.

use rand::Rng;

use super::geometry::{WorldBounds, distance2, step_towards};
use super::types::{Node, Phase, Point};

#[derive(Debug, Clone, Copy)]
pub struct MobilityModel {
    bounds: WorldBounds,
    /// Fraction of the vector toward the attractor covered in one step.
    speed: f64,
    min_distance: f64,
}

impl MobilityModel {
    pub fn new(bounds: WorldBounds, speed: f64, min_distance: f64) -> Self {
        Self { bounds, speed, min_distance }
    }

    /// Move every node according to `phase`, in id order.
    ///
    /// Nodes are moved one after another, so a scatter proposal is checked
    /// against positions already updated earlier in the same tick.
    ///
    /// # Returns
    ///
    /// The number of nodes whose position changed.
    pub fn advance<R: Rng + ?Sized>(&self, nodes: &mut [Node], phase: Phase, rng: &mut R) -> usize {
        let mut moved = 0;
        for index in 0..nodes.len() {
            let changed = match phase {
                Phase::Scatter => self.scatter(nodes, index, rng),
                Phase::Converge => {
                    self.converge(&mut nodes[index]);
                    true
                }
                Phase::Depart => {
                    self.depart(&mut nodes[index], rng);
                    true
                }
                Phase::Rebuild | Phase::BroadcastOgm => false,
            };
            if changed {
                moved += 1;
            }
        }
        moved
    }

    /// Collision-avoiding random step for `nodes[index]`.
    ///
    /// Returns `false` when the proposal was rejected and the node stayed put.
    pub fn scatter<R: Rng + ?Sized>(&self, nodes: &mut [Node], index: usize, rng: &mut R) -> bool {
        let attractor = self.bounds.random_point(rng);
        let proposal = step_towards(&nodes[index].position, &attractor, self.speed);
        if !self.is_clear(nodes, index, &proposal) {
            return false;
        }
        nodes[index].position = proposal;
        true
    }

    pub fn converge(&self, node: &mut Node) {
        node.position = step_towards(&node.position, &node.target_position, self.speed);
    }

    pub fn depart<R: Rng + ?Sized>(&self, node: &mut Node, rng: &mut R) {
        let attractor = self.bounds.random_point(rng);
        node.position = step_towards(&node.position, &attractor, self.speed);
    }

    /// True if `proposal` keeps at least `min_distance` from every other node.
    fn is_clear(&self, nodes: &[Node], index: usize, proposal: &Point) -> bool {
        let min2 = self.min_distance * self.min_distance;
        nodes
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .all(|(_, other)| distance2(proposal, &other.position) >= min2)
    }
}
