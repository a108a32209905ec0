//! # Game Client Library
//!
//! Client side of the platformer: the locally simulated player, a mirror of
//! every peer reported by the relay, coin claims and the shared text board.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client-authoritative state. The local player is stepped every frame with
//! the shared physics; peers, coins and texts are updated from relay packets.
//! Coin pickups are shown immediately as pending and settled by the relay's
//! `CoinCollected` broadcast.
//!
//! ### Input Module (`input`)
//! Movement keys and the text prompt. While the prompt is open the local
//! player does not move.
//!
//! ### Network Module (`network`)
//! WebSocket connection on a background thread. The frame loop polls it
//! without blocking.
//!
//! ### Rendering Module (`rendering`)
//! Macroquad drawing, plus the font-backed `TextMetrics` used for text
//! platform collision.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::game::ClientGameState;
//! use client::network::{NetworkClient, NetworkEvent};
//! use shared::{Controls, FixedAdvance};
//!
//! let mut game = ClientGameState::new();
//! let mut network = NetworkClient::connect("ws://127.0.0.1:3000")?;
//!
//! loop {
//!     for event in network.poll() {
//!         if let NetworkEvent::Packet(packet) = event {
//!             game.apply_server_packet(packet);
//!         }
//!     }
//!     for packet in game.step(&Controls::default(), &FixedAdvance::default()) {
//!         network.send(packet);
//!     }
//!     # break;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
