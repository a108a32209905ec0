//! # Relay Server Library
//!
//! The relay holds the shared state of a platformer session in memory and
//! rebroadcasts client events. It does not simulate anything: every client
//! runs its own physics and reports the result, and the relay stores and
//! forwards it.
//!
//! ## What the relay owns
//!
//! - **Players**: one entry per live connection, created on connect with a
//!   random color and removed on disconnect. Positions are whatever the
//!   owning client last reported.
//! - **Coins**: one per platform. A coin is collected at most once; the first
//!   claim to reach the relay wins and later claims are ignored.
//! - **Texts**: the three most recent placed texts, oldest evicted first.
//!
//! ## Event flow
//!
//! Each WebSocket connection runs a reader task and a writer task. Readers
//! decode frames into [`shared::Packet`]s and forward them, tagged with the
//! connection's id, over a channel to a single relay loop. The loop applies
//! one message at a time to [`state::RelayState`] and queues the resulting
//! broadcasts on the per-connection writers. Nothing is acknowledged or
//! retried; a connection is cleaned up only when its socket closes.
//!
//! | Incoming              | Relay reaction                                   |
//! |-----------------------|--------------------------------------------------|
//! | connect               | snapshot to the newcomer, `NewPlayer` to others  |
//! | `PlayerMove`          | store, `PlayerMoved` to others                   |
//! | `CollectCoin`         | first claim only: `CoinCollected` to everyone    |
//! | `PlaceText`           | FIFO insert, `TextPlaced` to everyone            |
//! | disconnect            | remove, `PlayerDisconnected` to everyone left    |
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::new("127.0.0.1:3000", 32).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod relay;
pub mod state;
