use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod physics;
pub mod world;

pub use physics::{apply_controls, resolve_platform_collision, step, Contact, Controls};
pub use physics::{FixedAdvance, TextMetrics};
pub use world::{level_coins, level_platforms, Coin, PlacedText, Platform, TextBoard};

pub const PROTOCOL_VERSION: u32 = 1;

pub const WORLD_WIDTH: f32 = 1600.0;
pub const WORLD_HEIGHT: f32 = 800.0;
pub const GROUND_HEIGHT: f32 = 60.0;
pub const GROUND_Y: f32 = WORLD_HEIGHT - GROUND_HEIGHT;

pub const GRAVITY: f32 = 0.5;
pub const PLAYER_RADIUS: f32 = 30.0;
pub const PLAYER_SPEED: f32 = 3.0;
pub const JUMP_VELOCITY: f32 = -12.0;
pub const LANDING_DEFORMATION: f32 = 0.3;
pub const DEFORMATION_RECOVERY: f32 = 0.2;

pub const COIN_SIZE: f32 = 30.0;
pub const COIN_LIFT: f32 = 15.0;
pub const MAX_COLLECTED_COINS: usize = 3;

pub const TEXT_BOARD_CAPACITY: usize = 3;
pub const TEXT_SIZE: f32 = 20.0;

pub const SERVER_SPAWN: (f32, f32) = (200.0, 150.0);
pub const CLIENT_SPAWN: (f32, f32) = (50.0, GROUND_Y - PLAYER_RADIUS);

pub type PlayerId = u32;

/// Messages exchanged between clients and the relay.
///
/// Variants are grouped by direction. The relay drops client-bound variants
/// arriving from a client and the client ignores relay-bound ones.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> relay
    PlayerMove {
        x: f32,
        y: f32,
    },
    CollectCoin {
        index: usize,
    },
    PlaceText {
        x: f32,
        y: f32,
        content: String,
    },

    // Relay -> client
    Welcome {
        client_id: PlayerId,
    },
    CurrentPlayers {
        players: HashMap<PlayerId, Player>,
    },
    UpdateCoins {
        coins: Vec<Coin>,
    },
    UpdateTexts {
        texts: Vec<PlacedText>,
    },
    NewPlayer {
        player: Player,
    },
    PlayerMoved {
        id: PlayerId,
        x: f32,
        y: f32,
    },
    PlayerDisconnected {
        id: PlayerId,
    },
    CoinCollected {
        index: usize,
        collector: PlayerId,
    },
    TextPlaced {
        text: PlacedText,
        author: PlayerId,
    },
    Rejected {
        reason: String,
    },
}

/// Versioned frame wrapping every packet on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope {
    pub version: u32,
    pub packet: Packet,
}

#[derive(Debug)]
pub enum DecodeError {
    Malformed(bincode::Error),
    VersionMismatch { expected: u32, found: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "malformed frame: {}", e),
            DecodeError::VersionMismatch { expected, found } => {
                write!(f, "protocol version {} (expected {})", found, expected)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Malformed(e) => Some(e),
            DecodeError::VersionMismatch { .. } => None,
        }
    }
}

impl From<bincode::Error> for DecodeError {
    fn from(e: bincode::Error) -> Self {
        DecodeError::Malformed(e)
    }
}

/// Wraps `packet` in an envelope at the current protocol version.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    let envelope = Envelope {
        version: PROTOCOL_VERSION,
        packet: packet.clone(),
    };
    bincode::serialize(&envelope)
}

/// Decodes one frame, rejecting any other protocol version.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, DecodeError> {
    let envelope: Envelope = bincode::deserialize(bytes)?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(DecodeError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            found: envelope.version,
        });
    }
    Ok(envelope.packet)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub color: [u8; 3],
    pub on_ground: bool,
    /// Landing squash, only used for drawing.
    pub deformation: f32,
    /// Indices into the coin list.
    pub collected_coins: Vec<usize>,
}

impl Player {
    pub fn new(id: PlayerId, x: f32, y: f32, color: [u8; 3]) -> Self {
        Self {
            id,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            radius: PLAYER_RADIUS,
            color,
            on_ground: false,
            deformation: 0.0,
            collected_coins: Vec::new(),
        }
    }

    /// Whether the player is still under the per-player coin cap.
    pub fn can_collect_more(&self) -> bool {
        self.collected_coins.len() < MAX_COLLECTED_COINS
    }
}
