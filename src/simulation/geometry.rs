//! Geometry helpers for the 2D world.
//!
//! Contains helper functions for:
//! - Distance calculations (squared distance to avoid sqrt in hot paths)
//! - Fractional steps toward an attractor point
//! - The rectangular world bounds and uniform sampling inside them

use rand::Rng;

use super::types::Point;

/// Squared Euclidean distance (avoids a sqrt in hot paths).
///
/// Comparing d1² against d2² orders distances without computing the square
/// root. The topology builder compares every node pair each adjacency phase, so
/// this is the hot path of the simulation.
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Euclidean distance.
#[cfg(test)]
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance2(a, b).sqrt()
}

/// Move `fraction` of the way from `from` toward `to`.
///
/// A fraction in `[0, 1]` keeps the result on the segment between the two
/// points, so a step toward a point inside a convex world never leaves it.
pub fn step_towards(from: &Point, to: &Point, fraction: f64) -> Point {
    Point {
        x: from.x + (to.x - from.x) * fraction,
        y: from.y + (to.y - from.y) * fraction,
    }
}

/// Axis-aligned rectangular world, inclusive on all edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldBounds {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive point-in-rectangle test.
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Sample a point uniformly inside the bounds.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        Point {
            x: rng.gen_range(self.min_x..=self.max_x),
            y: rng.gen_range(self.min_y..=self.max_y),
        }
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(50.0, 50.0, 750.0, 550.0)
    }
}
