//! Combat system - bullets, hit detection, respawn timing

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::util::time::SIMULATION_TPS;

use super::physics::{PhysicsSystem, Vector2, ARENA_HEIGHT, ARENA_WIDTH};
use super::room::Player;

/// Bullet hitbox radius
pub const BULLET_RADIUS: f64 = 5.0;
/// Bullet speed in units per second
pub const BULLET_SPEED: f64 = 400.0;
/// Distance a bullet covers per tick
pub const BULLET_MOVE_DELTA: f64 = BULLET_SPEED / SIMULATION_TPS as f64;
/// How long a hit player stays down before respawning
pub const RESPAWN_TIME: Duration = Duration::from_secs(1);

/// Active bullet in a room
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub owner: Uuid,
    pub direction: Vector2,
    pub position: Vector2,
}

impl Bullet {
    /// Spawn a bullet one step ahead of the firer, clear of its own hitbox
    pub fn fire(owner: Uuid, origin: Vector2, direction: Vector2) -> Self {
        Self {
            owner,
            direction,
            position: origin.offset(&direction, BULLET_MOVE_DELTA),
        }
    }

    /// Advance one tick along the bullet's direction
    pub fn advance(&mut self) {
        self.position = self.position.offset(&self.direction, BULLET_MOVE_DELTA);
    }

    /// True once any edge of the bullet crosses an arena boundary
    pub fn out_of_bounds(&self) -> bool {
        let side = if self.position.x - BULLET_RADIUS < 0.0 {
            "left"
        } else if self.position.y - BULLET_RADIUS < 0.0 {
            "top"
        } else if self.position.x + BULLET_RADIUS > ARENA_WIDTH {
            "right"
        } else if self.position.y + BULLET_RADIUS > ARENA_HEIGHT {
            "bottom"
        } else {
            return false;
        };

        debug!(
            owner = %self.owner,
            x = self.position.x,
            y = self.position.y,
            side,
            "Bullet left the arena"
        );
        true
    }
}

/// Combat rules shared by the room loop
pub struct CombatSystem;

impl CombatSystem {
    /// Check whether a bullet strikes a player. Players never hit themselves.
    pub fn check_collision(player: &Player, bullet: &Bullet) -> bool {
        if bullet.owner == player.id {
            return false;
        }

        PhysicsSystem::circles_overlap(&player.position, player.radius, &bullet.position, BULLET_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet_at(owner: Uuid, x: f64, y: f64) -> Bullet {
        Bullet {
            owner,
            direction: Vector2::new(1.0, 0.0),
            position: Vector2::new(x, y),
        }
    }

    #[test]
    fn fire_offsets_by_one_step() {
        let bullet = Bullet::fire(Uuid::new_v4(), Vector2::new(100.0, 100.0), Vector2::new(1.0, 0.0));
        assert_eq!(bullet.position, Vector2::new(100.0 + BULLET_MOVE_DELTA, 100.0));
    }

    #[test]
    fn advance_is_not_renormalized() {
        let mut bullet = Bullet::fire(Uuid::new_v4(), Vector2::new(100.0, 100.0), Vector2::new(2.0, 0.0));
        let start = bullet.position.x;
        bullet.advance();
        assert_eq!(bullet.position.x, start + 2.0 * BULLET_MOVE_DELTA);
    }

    #[test]
    fn out_of_bounds_on_every_side() {
        let owner = Uuid::new_v4();
        assert!(bullet_at(owner, 4.9, 300.0).out_of_bounds());
        assert!(bullet_at(owner, 300.0, 4.9).out_of_bounds());
        assert!(bullet_at(owner, 763.1, 300.0).out_of_bounds());
        assert!(bullet_at(owner, 300.0, 763.1).out_of_bounds());

        assert!(!bullet_at(owner, 5.0, 5.0).out_of_bounds());
        assert!(!bullet_at(owner, 763.0, 763.0).out_of_bounds());
    }

    #[test]
    fn no_self_damage() {
        let player = Player::detached(Vector2::new(200.0, 200.0));
        let bullet = bullet_at(player.id, 200.0, 200.0);
        assert!(!CombatSystem::check_collision(&player, &bullet));
    }

    #[test]
    fn hits_within_combined_radius() {
        let player = Player::detached(Vector2::new(200.0, 200.0));
        let other = Uuid::new_v4();

        assert!(CombatSystem::check_collision(&player, &bullet_at(other, 214.0, 200.0)));
        assert!(!CombatSystem::check_collision(&player, &bullet_at(other, 215.0, 200.0)));
        assert!(!CombatSystem::check_collision(&player, &bullet_at(other, 211.0, 211.0)));
    }
}
