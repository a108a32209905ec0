//! Connection registry for the relay.
//!
//! Each connected client owns an outbound queue drained by its own writer
//! task. The manager hands out ids, enforces the connection cap and fans
//! packets out to the queues. Sends are fire-and-forget: a queue whose
//! writer has gone away is skipped, and the disconnect that follows cleans
//! it up.

use log::{debug, info};
use shared::{Packet, PlayerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

pub type Outbound = mpsc::UnboundedSender<Packet>;

/// A connected client and the queue feeding its socket.
#[derive(Debug)]
pub struct Client {
    /// Unique id assigned by the relay, never reused
    pub id: PlayerId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: Outbound,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: Outbound) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a packet. Returns false if the connection's writer is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet).is_ok()
    }
}

pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<PlayerId, Client>,
    /// Next available client ID for new connections
    next_client_id: PlayerId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a connection, returning its id, or None when full.
    pub fn add_client(&mut self, addr: SocketAddr, sender: Outbound) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Unregisters a connection. Dropping the client closes its outbound
    /// queue, which ends the connection's writer task.
    ///
    /// Returns false if the id was not registered.
    pub fn remove_client(&mut self, client_id: PlayerId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!(
                "Client {} ({}) disconnected after {:.1}s",
                client.id,
                client.addr,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Whether `client_id` completed the join and is still connected.
    pub fn contains(&self, client_id: PlayerId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Queues a packet for a single client.
    ///
    /// Unknown ids and closed queues are logged and otherwise ignored; the
    /// disconnect path cleans those up.
    pub fn send_to(&self, client_id: PlayerId, packet: Packet) {
        match self.clients.get(&client_id) {
            Some(client) => {
                if !client.send(packet) {
                    debug!("Outbound queue for client {} is closed", client_id);
                }
            }
            None => debug!("Dropping packet for unknown client {}", client_id),
        }
    }

    /// Queues `packet` for every client except `exclude`.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<PlayerId>) {
        for (id, client) in &self.clients {
            if Some(*id) == exclude {
                continue;
            }
            if !client.send(packet.clone()) {
                debug!("Outbound queue for client {} is closed", id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
