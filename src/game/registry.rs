//! Fixed registry of rooms created at startup

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::room::{Room, RoomLoop, RoomSummary};

/// Registry lookup errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("room not found")]
    NotFound,
}

/// All rooms served by this process. Rooms live for the process lifetime.
pub struct Game {
    rooms: Vec<Arc<Room>>,
}

impl Game {
    /// Create `room_count` rooms named `Room 1..N` and spawn their loops.
    /// Must be called inside a Tokio runtime.
    pub fn new(room_count: usize, slots: usize) -> Self {
        let game = Self::spawn(
            (1..=room_count)
                .map(|n| Room::new(format!("Room {}", n), slots))
                .collect(),
        );
        info!(rooms = game.rooms.len(), slots, "Room registry ready");
        game
    }

    /// Spawn loops for pre-built rooms and register them
    pub fn spawn(rooms: Vec<(Arc<Room>, RoomLoop)>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|(room, room_loop)| {
                tokio::spawn(room_loop.run());
                room
            })
            .collect();
        Self { rooms }
    }

    /// Snapshot of every room in creation order
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(|room| room.summary()).collect()
    }

    /// Look up a room by its id string
    pub fn get_room(&self, id: &str) -> Result<Arc<Room>, RegistryError> {
        let id: Uuid = id.parse().map_err(|_| RegistryError::NotFound)?;
        self.rooms
            .iter()
            .find(|room| room.id == id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|room| room.player_count()).sum()
    }
}
