//! Arena geometry and player movement constraints

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::Movement;

/// Arena width in world units
pub const ARENA_WIDTH: f64 = 768.0;
/// Arena height in world units
pub const ARENA_HEIGHT: f64 = 768.0;
/// Player hitbox radius
pub const PLAYER_RADIUS: f64 = 10.0;
/// Distance covered by a single movement event
pub const MOVE_DELTA: f64 = 5.0;

/// 2D vector in world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Vector2) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// This point moved `scale` units along `direction` (direction is not normalized)
    pub fn offset(&self, direction: &Vector2, scale: f64) -> Vector2 {
        Vector2 {
            x: self.x + direction.x * scale,
            y: self.y + direction.y * scale,
        }
    }
}

/// Physics system for positioning players inside the arena
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply one movement event to a position.
    ///
    /// Each flag moves the matching axis by [`MOVE_DELTA`]; a step that would
    /// leave `[radius, dimension - radius]` lands exactly on the boundary instead.
    pub fn step(position: Vector2, radius: f64, movement: &Movement) -> Vector2 {
        let mut next = position;

        if movement.up {
            if next.y >= radius + MOVE_DELTA {
                next.y -= MOVE_DELTA;
            } else {
                next.y = radius;
            }
        }
        if movement.down {
            if next.y <= ARENA_HEIGHT - (radius + MOVE_DELTA) {
                next.y += MOVE_DELTA;
            } else {
                next.y = ARENA_HEIGHT - radius;
            }
        }
        if movement.left {
            if next.x >= radius + MOVE_DELTA {
                next.x -= MOVE_DELTA;
            } else {
                next.x = radius;
            }
        }
        if movement.right {
            if next.x <= ARENA_WIDTH - (radius + MOVE_DELTA) {
                next.x += MOVE_DELTA;
            } else {
                next.x = ARENA_WIDTH - radius;
            }
        }

        next
    }

    /// Uniformly random position keeping a circle of `radius` fully inside the arena
    pub fn random_position<R: Rng + ?Sized>(rng: &mut R, radius: f64) -> Vector2 {
        Vector2 {
            x: rng.gen_range(radius..=ARENA_WIDTH - radius),
            y: rng.gen_range(radius..=ARENA_HEIGHT - radius),
        }
    }

    /// Check whether a circle of `radius` lies fully inside the arena
    pub fn in_arena(position: &Vector2, radius: f64) -> bool {
        position.x >= radius
            && position.x <= ARENA_WIDTH - radius
            && position.y >= radius
            && position.y <= ARENA_HEIGHT - radius
    }

    /// Strict circle overlap test
    pub fn circles_overlap(a: &Vector2, radius_a: f64, b: &Vector2, radius_b: f64) -> bool {
        a.distance(b) < radius_a + radius_b
    }
}
