//! Client-side game state: the locally simulated player, the peer table
//! mirrored from the relay, coins with per-claim status, and the text board.

use log::{debug, info, warn};
use shared::physics::{self, Controls, TextMetrics};
use shared::{
    level_coins, level_platforms, Coin, Packet, PlacedText, Platform, Player, PlayerId, TextBoard,
    CLIENT_SPAWN,
};
use std::collections::{HashMap, VecDeque};

/// Status of a coin this client picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// Collected locally, relay has not answered yet
    Pending,
    /// Relay credited this client
    Confirmed,
}

pub struct ClientGameState {
    pub client_id: Option<PlayerId>,
    pub player: Player,
    pub others: HashMap<PlayerId, Player>,
    pub platforms: Vec<Platform>,
    pub coins: Vec<Coin>,
    pub claims: HashMap<usize, ClaimState>,
    /// Mirror of the relay's board, in the order the relay applied texts
    pub texts: TextBoard,
    /// Set when the relay refused the connection
    pub rejected: Option<String>,

    // Sent by this client, echo not received yet. Never part of `texts`.
    pending_texts: VecDeque<PlacedText>,
}

impl ClientGameState {
    /// Fresh state before the relay's snapshot: the level's platforms and
    /// coins, a neutral-colored player at the spawn point, and no peers.
    pub fn new() -> Self {
        let platforms = level_platforms();
        let coins = level_coins(&platforms);

        Self {
            client_id: None,
            player: Player::new(0, CLIENT_SPAWN.0, CLIENT_SPAWN.1, [200, 200, 200]),
            others: HashMap::new(),
            platforms,
            coins,
            claims: HashMap::new(),
            texts: TextBoard::new(),
            rejected: None,
            pending_texts: VecDeque::new(),
        }
    }

    /// Runs one physics frame for the local player and returns the packets
    /// it produced: coin claims, then the new position.
    pub fn step(&mut self, controls: &Controls, metrics: &dyn TextMetrics) -> Vec<Packet> {
        let board = self.board();
        physics::apply_controls(&mut self.player, controls);
        physics::step(&mut self.player, &self.platforms, &board, metrics);

        let mut packets = self.collect_coins();
        packets.push(self.position_packet());
        packets
    }

    /// The local player's current position, as sent every frame.
    pub fn position_packet(&self) -> Packet {
        Packet::PlayerMove {
            x: self.player.x,
            y: self.player.y,
        }
    }

    fn collect_coins(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();

        for (index, coin) in self.coins.iter_mut().enumerate() {
            if coin.collected || !coin.touches(&self.player) || !self.player.can_collect_more() {
                continue;
            }

            coin.collected = true;
            self.player.collected_coins.push(index);
            self.claims.insert(index, ClaimState::Pending);
            debug!("Claiming coin {}", index);
            packets.push(Packet::CollectCoin { index });
        }

        packets
    }

    /// The board as this client sees it: the relay's board with texts still
    /// awaiting their echo placed on top, oldest evicted first. Used for
    /// drawing and collision.
    pub fn board(&self) -> TextBoard {
        let mut board = self.texts.clone();
        for text in &self.pending_texts {
            board.place(text.clone());
        }
        board
    }

    /// Records a text as awaiting its echo and returns the packet that
    /// announces it.
    ///
    /// Returns None before the relay has welcomed this client, for empty
    /// content and for a non-finite anchor. The caller must send the
    /// packet; a pending text only leaves the queue through its echo or
    /// `connection_lost`.
    pub fn place_text(&mut self, x: f32, y: f32, content: &str) -> Option<Packet> {
        let text = PlacedText::new(x, y, content);
        if self.client_id.is_none() || !text.is_valid() {
            return None;
        }

        self.pending_texts.push_back(text);

        Some(Packet::PlaceText {
            x,
            y,
            content: content.to_string(),
        })
    }

    /// Status of this client's claim on coin `index`, if it made one.
    pub fn claim_state(&self, index: usize) -> Option<ClaimState> {
        self.claims.get(&index).copied()
    }

    /// Forgets texts whose echo can no longer arrive because the
    /// connection closed.
    pub fn connection_lost(&mut self) {
        if !self.pending_texts.is_empty() {
            debug!("Dropping {} unconfirmed texts", self.pending_texts.len());
        }
        self.pending_texts.clear();
    }

    /// Applies one relay packet.
    ///
    /// Snapshots replace the peer table, coins and the text board. Deltas
    /// update them in place, and `CoinCollected` settles any pending claim.
    /// Relay-bound variants are ignored.
    pub fn apply_server_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Welcome { client_id } => {
                info!("Joined as player {}", client_id);
                self.client_id = Some(client_id);
                self.player.id = client_id;
            }

            Packet::CurrentPlayers { mut players } => {
                if let Some(me) = self.client_id.and_then(|id| players.remove(&id)) {
                    self.player.color = me.color;
                }
                self.others = players;
            }

            Packet::UpdateCoins { coins } => {
                self.coins = coins;
            }

            Packet::UpdateTexts { texts } => {
                let valid: Vec<PlacedText> = texts.into_iter().filter(|t| t.is_valid()).collect();
                self.texts.replace(valid);
                self.pending_texts.clear();
            }

            Packet::NewPlayer { player } => {
                if Some(player.id) != self.client_id {
                    self.others.insert(player.id, player);
                }
            }

            Packet::PlayerMoved { id, x, y } => {
                if let Some(other) = self.others.get_mut(&id) {
                    other.x = x;
                    other.y = y;
                }
            }

            Packet::PlayerDisconnected { id } => {
                self.others.remove(&id);
            }

            Packet::CoinCollected { index, collector } => {
                self.confirm_coin(index, collector);
            }

            Packet::TextPlaced { text, author } => {
                if !text.is_valid() {
                    warn!("Ignoring malformed text from player {}", author);
                    return;
                }
                if Some(author) == self.client_id {
                    if let Some(pos) = self.pending_texts.iter().position(|t| *t == text) {
                        self.pending_texts.remove(pos);
                    }
                }
                self.texts.place(text);
            }

            Packet::Rejected { reason } => {
                warn!("Relay refused connection: {}", reason);
                self.rejected = Some(reason);
            }

            other => debug!("Ignoring client-bound packet {:?}", other),
        }
    }

    fn confirm_coin(&mut self, index: usize, collector: PlayerId) {
        let Some(coin) = self.coins.get_mut(index) else {
            warn!("Relay confirmed unknown coin {}", index);
            return;
        };
        coin.collected = true;

        if Some(collector) == self.client_id {
            self.claims.insert(index, ClaimState::Confirmed);
            if !self.player.collected_coins.contains(&index) {
                self.player.collected_coins.push(index);
            }
            return;
        }

        if self.claims.get(&index) == Some(&ClaimState::Pending) {
            info!("Lost coin {} to player {}", index, collector);
            self.claims.remove(&index);
            self.player.collected_coins.retain(|i| *i != index);
        }

        if let Some(other) = self.others.get_mut(&collector) {
            other.collected_coins.push(index);
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
