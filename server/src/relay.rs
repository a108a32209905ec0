//! Relay event protocol.
//!
//! `Relay` owns the canonical state and the connection registry and applies
//! one `ServerMessage` at a time. Connection tasks never touch state
//! directly; they only feed messages into the relay's channel.

use crate::client_manager::{ClientManager, Outbound};
use crate::state::RelayState;
use log::{debug, info, warn};
use rand::Rng;
use shared::{Packet, PlacedText, PlayerId};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Messages sent from connection tasks to the relay loop
#[derive(Debug)]
pub enum ServerMessage {
    Connect {
        addr: SocketAddr,
        outbound: Outbound,
        reply: oneshot::Sender<Option<PlayerId>>,
    },
    PacketReceived {
        client_id: PlayerId,
        packet: Packet,
    },
    Disconnect {
        client_id: PlayerId,
    },
}

/// Single owner of the relay state and the connection registry.
pub struct Relay {
    state: RelayState,
    clients: ClientManager,
}

impl Relay {
    pub fn new(max_clients: usize) -> Self {
        Self {
            state: RelayState::new(),
            clients: ClientManager::new(max_clients),
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Number of connections that completed the join.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Applies one message from a connection task.
    ///
    /// `Connect` answers through its oneshot reply. If the connection task
    /// gave up waiting, the join is rolled back so no ghost player remains.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connect {
                addr,
                outbound,
                reply,
            } => {
                let client_id = self.connect(addr, outbound);
                if reply.send(client_id).is_err() {
                    // Connection task died while waiting; undo the join.
                    if let Some(id) = client_id {
                        self.disconnect(id);
                    }
                }
            }
            ServerMessage::PacketReceived { client_id, packet } => {
                self.handle_packet(client_id, packet);
            }
            ServerMessage::Disconnect { client_id } => {
                self.disconnect(client_id);
            }
        }
    }

    /// Registers a connection and sends it the full snapshot.
    pub fn connect(&mut self, addr: SocketAddr, outbound: Outbound) -> Option<PlayerId> {
        let Some(client_id) = self.clients.add_client(addr, outbound.clone()) else {
            info!("Rejecting connection from {}: server full", addr);
            let _ = outbound.send(Packet::Rejected {
                reason: "Server full".to_string(),
            });
            return None;
        };

        let color = rand::thread_rng().gen::<[u8; 3]>();
        let player = self.state.add_player(client_id, color);

        self.clients
            .send_to(client_id, Packet::Welcome { client_id });
        self.clients.send_to(
            client_id,
            Packet::CurrentPlayers {
                players: self.state.players.clone(),
            },
        );
        self.clients.send_to(
            client_id,
            Packet::UpdateCoins {
                coins: self.state.coins.clone(),
            },
        );
        self.clients.send_to(
            client_id,
            Packet::UpdateTexts {
                texts: self.state.texts.to_vec(),
            },
        );

        self.clients
            .broadcast(&Packet::NewPlayer { player }, Some(client_id));

        Some(client_id)
    }

    /// Applies one packet from a joined client and broadcasts the result.
    ///
    /// Moves go to everyone but the mover. Coin confirmations and placed
    /// texts go to everyone, the sender included, so every board sees the
    /// same order. Invalid claims and malformed texts change nothing and
    /// send nothing. Packets from unregistered ids are dropped.
    pub fn handle_packet(&mut self, client_id: PlayerId, packet: Packet) {
        if !self.clients.contains(client_id) {
            debug!("Packet from unregistered client {}", client_id);
            return;
        }

        match packet {
            Packet::PlayerMove { x, y } => {
                if self.state.move_player(client_id, x, y) {
                    self.clients.broadcast(
                        &Packet::PlayerMoved {
                            id: client_id,
                            x,
                            y,
                        },
                        Some(client_id),
                    );
                }
            }

            Packet::CollectCoin { index } => {
                if self.state.claim_coin(client_id, index) {
                    info!("Client {} collected coin {}", client_id, index);
                    self.clients.broadcast(
                        &Packet::CoinCollected {
                            index,
                            collector: client_id,
                        },
                        None,
                    );
                }
            }

            Packet::PlaceText { x, y, content } => {
                let text = PlacedText::new(x, y, content);
                if self.state.place_text(text.clone()) {
                    self.clients.broadcast(
                        &Packet::TextPlaced {
                            text,
                            author: client_id,
                        },
                        None,
                    );
                } else {
                    warn!(
                        "Dropping malformed text from client {} at ({}, {})",
                        client_id, x, y
                    );
                }
            }

            other => {
                warn!("Unexpected packet from client {}: {:?}", client_id, other);
            }
        }
    }

    /// Removes a client and tells everyone left.
    ///
    /// Coins the player collected stay collected. Calling this for an id
    /// that is already gone broadcasts nothing.
    pub fn disconnect(&mut self, client_id: PlayerId) {
        self.clients.remove_client(client_id);
        if self.state.remove_player(client_id) {
            self.clients
                .broadcast(&Packet::PlayerDisconnected { id: client_id }, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:3000".parse().unwrap()
    }

    fn join(relay: &mut Relay) -> (PlayerId, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = relay.connect(test_addr(), tx).expect("relay full");
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Packet>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn test_connect_sends_snapshot_then_announces() {
        let mut relay = Relay::new(8);
        let (first, mut rx1) = join(&mut relay);
        relay.handle_packet(first, Packet::CollectCoin { index: 1 });
        relay.handle_packet(
            first,
            Packet::PlaceText {
                x: 5.0,
                y: 6.0,
                content: "hi".to_string(),
            },
        );
        drain(&mut rx1);

        let (second, mut rx2) = join(&mut relay);
        let snapshot = drain(&mut rx2);

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0], Packet::Welcome { client_id: second });
        match &snapshot[1] {
            Packet::CurrentPlayers { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[&first].collected_coins, vec![1]);
                assert!(players.contains_key(&second));
            }
            other => panic!("Expected CurrentPlayers, got {:?}", other),
        }
        assert_eq!(
            snapshot[2],
            Packet::UpdateCoins {
                coins: relay.state().coins.clone()
            }
        );
        assert_eq!(
            snapshot[3],
            Packet::UpdateTexts {
                texts: vec![PlacedText::new(5.0, 6.0, "hi")]
            }
        );

        match drain(&mut rx1).as_slice() {
            [Packet::NewPlayer { player }] => assert_eq!(player.id, second),
            other => panic!("Expected one NewPlayer, got {:?}", other),
        }
    }

    #[test]
    fn test_move_is_relayed_to_others_only() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        let (_b, mut rx_b) = join(&mut relay);
        drain(&mut rx_a);
        drain(&mut rx_b);

        relay.handle_packet(a, Packet::PlayerMove { x: 11.0, y: 22.0 });

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(
            drain(&mut rx_b),
            vec![Packet::PlayerMoved {
                id: a,
                x: 11.0,
                y: 22.0
            }]
        );
        let stored = &relay.state().players[&a];
        assert_eq!((stored.x, stored.y), (11.0, 22.0));
    }

    #[test]
    fn test_duplicate_claims_confirm_once() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        let (b, mut rx_b) = join(&mut relay);
        drain(&mut rx_a);
        drain(&mut rx_b);

        relay.handle_packet(a, Packet::CollectCoin { index: 2 });
        relay.handle_packet(b, Packet::CollectCoin { index: 2 });
        relay.handle_packet(a, Packet::CollectCoin { index: 2 });

        let confirmation = Packet::CoinCollected {
            index: 2,
            collector: a,
        };
        assert_eq!(drain(&mut rx_a), vec![confirmation.clone()]);
        assert_eq!(drain(&mut rx_b), vec![confirmation]);
        assert_eq!(relay.state().players[&a].collected_coins, vec![2]);
        assert!(relay.state().players[&b].collected_coins.is_empty());
    }

    #[test]
    fn test_invalid_coin_index_ignored() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        drain(&mut rx_a);

        relay.handle_packet(a, Packet::CollectCoin { index: 1000 });

        assert!(drain(&mut rx_a).is_empty());
        assert!(relay.state().coins.iter().all(|c| !c.collected));
    }

    #[test]
    fn test_text_is_echoed_to_everyone() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        let (_b, mut rx_b) = join(&mut relay);
        drain(&mut rx_a);
        drain(&mut rx_b);

        for content in ["a", "b", "c", "d"] {
            relay.handle_packet(
                a,
                Packet::PlaceText {
                    x: 1.0,
                    y: 2.0,
                    content: content.to_string(),
                },
            );
        }
        relay.handle_packet(
            a,
            Packet::PlaceText {
                x: 1.0,
                y: 2.0,
                content: String::new(),
            },
        );

        assert_eq!(drain(&mut rx_a).len(), 4);
        assert_eq!(drain(&mut rx_b).len(), 4);
        let contents: Vec<String> = relay
            .state()
            .texts
            .iter()
            .map(|t| t.content.clone())
            .collect();
        assert_eq!(contents, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_non_finite_text_is_not_relayed() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        let (_b, mut rx_b) = join(&mut relay);
        drain(&mut rx_a);
        drain(&mut rx_b);

        relay.handle_packet(
            a,
            Packet::PlaceText {
                x: f32::NAN,
                y: 300.0,
                content: "x".to_string(),
            },
        );

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert!(relay.state().texts.is_empty());
    }

    #[test]
    fn test_disconnect_cleans_up_and_notifies() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        let (b, mut rx_b) = join(&mut relay);
        drain(&mut rx_a);
        drain(&mut rx_b);

        relay.disconnect(b);

        assert_eq!(drain(&mut rx_a), vec![Packet::PlayerDisconnected { id: b }]);
        assert!(!relay.state().players.contains_key(&b));
        assert_eq!(relay.client_count(), 1);

        // Late packets from the departed connection are ignored.
        relay.handle_packet(b, Packet::PlayerMove { x: 0.0, y: 0.0 });
        assert!(drain(&mut rx_a).is_empty());

        relay.disconnect(b);
        assert!(drain(&mut rx_a).is_empty());
        assert!(relay.state().players.contains_key(&a));
    }

    #[test]
    fn test_full_relay_rejects() {
        let mut relay = Relay::new(1);
        let (_a, _rx_a) = join(&mut relay);

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(relay.connect(test_addr(), tx), None);
        assert_eq!(
            drain(&mut rx),
            vec![Packet::Rejected {
                reason: "Server full".to_string()
            }]
        );
        assert_eq!(relay.state().players.len(), 1);
    }

    #[test]
    fn test_client_bound_packets_from_clients_are_dropped() {
        let mut relay = Relay::new(8);
        let (a, mut rx_a) = join(&mut relay);
        drain(&mut rx_a);

        relay.handle_packet(a, Packet::PlayerDisconnected { id: a });

        assert!(drain(&mut rx_a).is_empty());
        assert!(relay.state().players.contains_key(&a));
    }

    #[test]
    fn test_connect_message_replies_with_id() {
        let mut relay = Relay::new(8);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = oneshot::channel();

        relay.handle_message(ServerMessage::Connect {
            addr: test_addr(),
            outbound: tx,
            reply: reply_tx,
        });

        assert_eq!(reply_rx.try_recv().unwrap(), Some(1));
    }

    #[test]
    fn test_connect_with_dropped_reply_is_undone() {
        let mut relay = Relay::new(8);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);

        relay.handle_message(ServerMessage::Connect {
            addr: test_addr(),
            outbound: tx,
            reply: reply_tx,
        });

        assert_eq!(relay.client_count(), 0);
        assert!(relay.state().players.is_empty());
    }
}
