//! Snapshot building for network transmission

use crate::ws::protocol::{BulletSnapshot, PlayerSnapshot, ServerMsg};

use super::combat::Bullet;
use super::room::Player;

/// Builds full-state snapshots; rooms never send diffs
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build an update message from the room's current players and bullets
    pub fn build(players: &[Player], bullets: &[Bullet]) -> ServerMsg {
        ServerMsg::Update {
            players: players.iter().map(PlayerSnapshot::from).collect(),
            bullets: bullets.iter().map(BulletSnapshot::from).collect(),
        }
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            hue: p.hue,
            sequence: p.sequence,
            position: p.position,
            spawn_time: u64::try_from(p.spawn_time.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

impl From<&Bullet> for BulletSnapshot {
    fn from(b: &Bullet) -> Self {
        Self {
            owner: b.owner,
            direction: b.direction,
            position: b.position,
        }
    }
}
