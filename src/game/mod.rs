//! Game simulation modules

pub mod combat;
pub mod physics;
pub mod registry;
pub mod room;
pub mod snapshot;

pub use registry::{Game, RegistryError};
pub use room::{Room, RoomError, RoomMessage, RoomSummary};
