//! Canonical relay state: players, coins and the text board.
//!
//! The relay runs no physics. Positions are whatever the owning client last
//! reported; the only arbitration done here is first-claim-wins on coins.

use log::{debug, warn};
use shared::{
    level_coins, level_platforms, Coin, PlacedText, Player, PlayerId, TextBoard, SERVER_SPAWN,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RelayState {
    pub players: HashMap<PlayerId, Player>,
    pub coins: Vec<Coin>,
    pub texts: TextBoard,
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            coins: level_coins(&level_platforms()),
            texts: TextBoard::new(),
        }
    }

    /// Creates a player at the spawn point and returns a copy for the
    /// `NewPlayer` broadcast.
    pub fn add_player(&mut self, id: PlayerId, color: [u8; 3]) -> Player {
        let player = Player::new(id, SERVER_SPAWN.0, SERVER_SPAWN.1, color);
        self.players.insert(id, player.clone());
        player
    }

    /// Returns false if the player was already gone.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        self.players.remove(&id).is_some()
    }

    /// Stores a reported position. Returns false for unknown players.
    pub fn move_player(&mut self, id: PlayerId, x: f32, y: f32) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.x = x;
                player.y = y;
                true
            }
            None => false,
        }
    }

    /// Credits `index` to `id` if the coin exists and is still uncollected.
    ///
    /// Returns true exactly once per coin; later claims are no-ops.
    pub fn claim_coin(&mut self, id: PlayerId, index: usize) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            warn!("Coin claim from unknown player {}", id);
            return false;
        };

        let Some(coin) = self.coins.get_mut(index) else {
            warn!("Player {} claimed invalid coin index {}", id, index);
            return false;
        };

        if !coin.collect() {
            debug!("Coin {} already collected, ignoring claim from {}", index, id);
            return false;
        }

        player.collected_coins.push(index);
        true
    }

    /// Inserts a text with FIFO eviction.
    ///
    /// Empty content or a non-finite anchor is rejected and leaves the
    /// board untouched.
    pub fn place_text(&mut self, text: PlacedText) -> bool {
        if !text.is_valid() {
            return false;
        }
        if let Some(evicted) = self.texts.place(text) {
            debug!("Text board full, evicted {:?}", evicted.content);
        }
        true
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}
