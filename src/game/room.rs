//! Room state and authoritative tick loop

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::util::time::TICK_DURATION;
use crate::ws::protocol::{ClientEvent, Movement, ServerMsg};

use super::combat::{Bullet, CombatSystem, RESPAWN_TIME};
use super::physics::{PhysicsSystem, Vector2, PLAYER_RADIUS};
use super::snapshot::SnapshotBuilder;

/// Capacity of a room's inbound message queue
pub const INBOUND_QUEUE_CAPACITY: usize = 10;
/// Capacity of each player's outbound frame queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 10;
/// Hues are whole degrees in `0..HUE_RANGE`
const HUE_RANGE: u16 = 360;

/// Room errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room is full")]
    Full,

    #[error("room is no longer accepting input")]
    Closed,
}

/// Player state in a room (authoritative)
pub struct Player {
    pub id: Uuid,
    pub hue: u16,
    /// Last client sequence number seen on a movement event
    pub sequence: i64,
    pub position: Vector2,
    pub radius: f64,
    /// Remaining respawn time; zero means alive and hittable
    pub spawn_time: Duration,

    outbound: mpsc::Sender<String>,
    close: Option<oneshot::Sender<()>>,
    /// A snapshot was dropped on a full queue and has not been replaced yet
    stale: bool,
}

impl Player {
    pub fn is_respawning(&self) -> bool {
        !self.spawn_time.is_zero()
    }

    /// Apply one movement event. Sequence numbers are recorded, never validated.
    pub fn apply_movement(&mut self, sequence: i64, movement: &Movement) {
        self.sequence = sequence;
        self.position = PhysicsSystem::step(self.position, self.radius, movement);
    }

    /// Queue a frame for this player's writer without waiting.
    ///
    /// Snapshots are full state, so a frame that doesn't fit is dropped and
    /// the player is marked stale until a later snapshot gets through.
    fn deliver(&mut self, frame: String) {
        match self.outbound.try_send(frame) {
            Ok(()) => self.stale = false,
            Err(TrySendError::Full(_)) => {
                debug!(player_id = %self.id, "Outbound queue full, dropping frame");
                self.stale = true;
            }
            Err(TrySendError::Closed(_)) => {
                debug!(player_id = %self.id, "Outbound queue closed");
            }
        }
    }

    fn signal_close(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }

    /// A player with no live connection, for simulation tests
    #[cfg(test)]
    pub fn detached(position: Vector2) -> Self {
        let (outbound, _) = mpsc::channel(1);
        Self {
            id: Uuid::new_v4(),
            hue: 0,
            sequence: 0,
            position,
            radius: PLAYER_RADIUS,
            spawn_time: Duration::ZERO,
            outbound,
            close: None,
            stale: false,
        }
    }
}

/// Input routed into a room, tagged with the player it came from
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub player_id: Uuid,
    pub event: ClientEvent,
}

/// Connection-side half of a joined player
pub struct PlayerSession {
    pub player_id: Uuid,
    /// Frames to write to the wire, in order
    pub outbound_rx: mpsc::Receiver<String>,
    /// Fires when the room drops the player
    pub close_rx: oneshot::Receiver<()>,
}

/// Room listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub slots: usize,
    pub player_count: usize,
}

/// Mutable room state, only ever touched under the room lock
pub struct RoomState {
    room_id: Uuid,
    players: Vec<Player>,
    bullets: Vec<Bullet>,
    /// State changed since the last tick broadcast
    dirty: bool,
    rng: ChaCha8Rng,
}

impl RoomState {
    fn new(room_id: Uuid, rng: ChaCha8Rng) -> Self {
        Self {
            room_id,
            players: Vec::new(),
            bullets: Vec::new(),
            dirty: false,
            rng,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn player_mut(&mut self, id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Apply one client event. Events from players who already left are dropped.
    pub fn apply(&mut self, message: RoomMessage) {
        let RoomMessage { player_id, event } = message;

        match event {
            ClientEvent::Movement { sequence, movement } => {
                let Some(movement) = movement else {
                    debug!(player_id = %player_id, "Movement event without payload");
                    return;
                };
                if let Some(player) = self.player_mut(player_id) {
                    player.apply_movement(sequence, &movement);
                    self.dirty = true;
                }
            }
            ClientEvent::Fire { bullet, .. } => {
                let Some(payload) = bullet else {
                    debug!(player_id = %player_id, "Fire event without bullet");
                    return;
                };
                match self.players.iter().find(|p| p.id == player_id) {
                    Some(player) if !player.is_respawning() => {
                        let bullet = Bullet::fire(player.id, player.position, payload.direction);
                        self.bullets.push(bullet);
                    }
                    _ => {}
                }
            }
            ClientEvent::Reskin { .. } => {
                if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                    player.hue = self.rng.gen_range(0..HUE_RANGE);
                    self.dirty = true;
                }
            }
        }
    }

    /// Run one simulation step and broadcast if anything changed.
    /// In a quiet tick, players who missed the last snapshot get it again.
    pub fn tick(&mut self, elapsed: Duration) {
        self.step(elapsed);

        if self.dirty {
            if self.broadcast() {
                self.dirty = false;
            }
        } else if self.players.iter().any(|p| p.stale) {
            self.resend_stale();
        }
    }

    /// Advance the simulation by one tick without broadcasting
    fn step(&mut self, elapsed: Duration) {
        // Respawn countdowns; a player who reappears this tick can't be hit until the next
        let mut respawned = Vec::new();
        for player in self.players.iter_mut().filter(|p| p.is_respawning()) {
            player.spawn_time = player.spawn_time.saturating_sub(elapsed);
            if player.spawn_time.is_zero() {
                player.position = PhysicsSystem::random_position(&mut self.rng, player.radius);
                debug_assert!(PhysicsSystem::in_arena(&player.position, player.radius));
                respawned.push(player.id);
            }
            self.dirty = true;
        }

        // At most one hit per player per tick
        for player in self
            .players
            .iter_mut()
            .filter(|p| !p.is_respawning() && !respawned.contains(&p.id))
        {
            let hit = self
                .bullets
                .iter()
                .position(|b| CombatSystem::check_collision(player, b));

            if let Some(index) = hit {
                let bullet = self.bullets.remove(index);
                player.spawn_time = RESPAWN_TIME;
                self.dirty = true;
                debug!(
                    room_id = %self.room_id,
                    target = %player.id,
                    shooter = %bullet.owner,
                    "Player hit"
                );
            }
        }

        for bullet in &mut self.bullets {
            bullet.advance();
            self.dirty = true;
        }

        self.bullets.retain(|b| !b.out_of_bounds());
    }

    fn encode_snapshot(&self) -> Option<String> {
        match SnapshotBuilder::build(&self.players, &self.bullets).encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Failed to serialize room state");
                None
            }
        }
    }

    /// Push the full snapshot to every player. Returns false if it could not be encoded.
    fn broadcast(&mut self) -> bool {
        let Some(frame) = self.encode_snapshot() else {
            return false;
        };

        for player in &mut self.players {
            player.deliver(frame.clone());
        }
        true
    }

    /// Retry the current snapshot for players whose last one was dropped
    fn resend_stale(&mut self) {
        let Some(frame) = self.encode_snapshot() else {
            return;
        };

        for player in self.players.iter_mut().filter(|p| p.stale) {
            player.deliver(frame.clone());
        }
    }

    fn join(&mut self, slots: usize) -> Result<PlayerSession, RoomError> {
        if self.players.len() >= slots {
            return Err(RoomError::Full);
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (close_tx, close_rx) = oneshot::channel();

        let mut player = Player {
            id: Uuid::new_v4(),
            hue: self.rng.gen_range(0..HUE_RANGE),
            sequence: 0,
            position: PhysicsSystem::random_position(&mut self.rng, PLAYER_RADIUS),
            radius: PLAYER_RADIUS,
            spawn_time: Duration::ZERO,
            outbound: outbound_tx,
            close: Some(close_tx),
            stale: false,
        };
        let player_id = player.id;

        // Bootstrap is always the first frame in the new player's queue
        match (ServerMsg::Bootstrap { id: player_id }).encode() {
            Ok(frame) => player.deliver(frame),
            Err(e) => error!(player_id = %player_id, error = %e, "Failed to serialize bootstrap"),
        }

        self.players.push(player);
        self.broadcast();

        Ok(PlayerSession {
            player_id,
            outbound_rx,
            close_rx,
        })
    }

    fn leave(&mut self, player_id: Uuid) -> bool {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return false;
        };

        let mut player = self.players.remove(index);
        self.bullets.retain(|b| b.owner != player_id);
        self.broadcast();
        player.signal_close();
        true
    }
}

/// One arena instance: shared handle used by connections and the registry
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub slots: usize,
    state: Mutex<RoomState>,
    inbound_tx: mpsc::Sender<RoomMessage>,
}

impl Room {
    /// Create a room and the loop that drives it. The loop must be spawned.
    pub fn new(name: impl Into<String>, slots: usize) -> (Arc<Self>, RoomLoop) {
        Self::with_rng(name, slots, ChaCha8Rng::from_entropy())
    }

    pub fn with_rng(name: impl Into<String>, slots: usize, rng: ChaCha8Rng) -> (Arc<Self>, RoomLoop) {
        let id = Uuid::new_v4();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);

        let room = Arc::new(Self {
            id,
            name: name.into(),
            slots,
            state: Mutex::new(RoomState::new(id, rng)),
            inbound_tx,
        });

        let room_loop = RoomLoop {
            room: room.clone(),
            inbound_rx,
        };

        (room, room_loop)
    }

    /// Admit a new player, or reject without creating any state if the room is full
    pub fn add_player(&self) -> Result<PlayerSession, RoomError> {
        let session = self.state.lock().join(self.slots)?;
        info!(room_id = %self.id, player_id = %session.player_id, "Player joined room");
        Ok(session)
    }

    /// Drop a player and their bullets. Returns false if they were already gone.
    pub fn remove_player(&self, player_id: Uuid) -> bool {
        let removed = self.state.lock().leave(player_id);
        if removed {
            info!(room_id = %self.id, player_id = %player_id, "Player left room");
        }
        removed
    }

    /// Queue input for the room loop, waiting while the queue is full
    pub async fn submit(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.inbound_tx
            .send(message)
            .await
            .map_err(|_| RoomError::Closed)
    }

    pub fn player_count(&self) -> usize {
        self.state.lock().players.len()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.slots
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: self.name.clone(),
            slots: self.slots,
            player_count: self.player_count(),
        }
    }
}

/// The room's single serialized control loop
pub struct RoomLoop {
    room: Arc<Room>,
    inbound_rx: mpsc::Receiver<RoomMessage>,
}

impl RoomLoop {
    /// Consume input and ticks until the inbound queue closes
    pub async fn run(mut self) {
        info!(room_id = %self.room.id, name = %self.room.name, "Room loop started");

        let mut ticker = interval(TICK_DURATION);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                message = self.inbound_rx.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    debug!(
                        room_id = %self.room.id,
                        player_id = %message.player_id,
                        event = ?message.event,
                        "Received message"
                    );
                    self.room.state.lock().apply(message);
                }
                now = ticker.tick() => {
                    let elapsed = now.saturating_duration_since(last);
                    last = now;
                    self.room.state.lock().tick(elapsed);
                }
            }
        }

        info!(room_id = %self.room.id, "Room loop stopped");
    }
}
