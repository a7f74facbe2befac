//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::Game;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<Game>,
}

impl AppState {
    /// Build the room registry described by `config` and start every room loop
    pub fn new(config: Config) -> Self {
        let game = Arc::new(Game::new(config.room_count, config.room_slots));
        Self::with_game(config, game)
    }

    pub fn with_game(config: Config, game: Arc<Game>) -> Self {
        Self {
            config: Arc::new(config),
            game,
        }
    }
}
