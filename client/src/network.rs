//! Background connection to the relay.
//!
//! The socket lives on its own thread with a private tokio runtime so the
//! frame loop never waits on I/O. The frame loop drains received events with
//! `poll` and hands outgoing packets to `send`, which only queues them.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{decode_packet, encode_packet, Packet};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type NetworkError = Box<dyn std::error::Error + Send + Sync>;

/// What the connection thread reports to the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    Packet(Packet),
    Closed(String),
}

pub struct NetworkClient {
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: mpsc::UnboundedReceiver<NetworkEvent>,
    connected: bool,
}

impl NetworkClient {
    /// Starts connecting to `url` (e.g. `ws://127.0.0.1:3000`) in the
    /// background. Progress is reported through `poll`.
    pub fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let url = url.to_string();

        std::thread::Builder::new()
            .name("relay-connection".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if let Err(e) = pump(&url, outbound_rx, &inbound_tx).await {
                        warn!("Connection to {} failed: {}", url, e);
                        let _ = inbound_tx.send(NetworkEvent::Closed(e.to_string()));
                    }
                });
            })?;

        Ok(NetworkClient {
            outbound: outbound_tx,
            inbound: inbound_rx,
            connected: false,
        })
    }

    /// True between `Connected` and `Closed`, as of the last `poll`.
    ///
    /// Packets handed to `send` while this is false are dropped.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Queues a packet for the relay. Dropped while not connected.
    pub fn send(&self, packet: Packet) {
        if !self.connected {
            return;
        }
        if self.outbound.send(packet).is_err() {
            debug!("Connection thread is gone, dropping packet");
        }
    }

    /// Returns every event received since the last call.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inbound.try_recv() {
            match event {
                NetworkEvent::Connected => self.connected = true,
                NetworkEvent::Closed(_) => self.connected = false,
                NetworkEvent::Packet(_) => {}
            }
            events.push(event);
        }
        events
    }
}

async fn pump(
    url: &str,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: &mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), NetworkError> {
    let (ws, _) = connect_async(url).await?;
    info!("Connected to {}", url);
    let _ = inbound.send(NetworkEvent::Connected);

    let (mut sink, mut frames) = ws.split();

    loop {
        tokio::select! {
            packet = outbound.recv() => match packet {
                Some(packet) => {
                    let bytes = encode_packet(&packet)?;
                    sink.send(Message::Binary(bytes)).await?;
                }
                None => {
                    // The frame loop dropped its handle.
                    let _ = sink.close().await;
                    return Ok(());
                }
            },

            frame = frames.next() => match frame {
                Some(Ok(Message::Binary(bytes))) => match decode_packet(&bytes) {
                    Ok(packet) => {
                        if inbound.send(NetworkEvent::Packet(packet)).is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => warn!("Dropping frame from relay: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Relay closed the connection");
                    let _ = inbound.send(NetworkEvent::Closed("closed by relay".to_string()));
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio_test::assert_ok;

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("ws://127.0.0.1:{}", port)
    }

    #[test]
    fn test_unreachable_relay_reports_closed() {
        let mut client = assert_ok!(NetworkClient::connect(&closed_port_url()));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.is_empty() && Instant::now() < deadline {
            events = client.poll();
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(matches!(events.as_slice(), [NetworkEvent::Closed(_)]));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_send_before_connect_is_dropped() {
        let client = assert_ok!(NetworkClient::connect(&closed_port_url()));
        client.send(Packet::PlayerMove { x: 1.0, y: 2.0 });
        assert!(!client.is_connected());
    }
}
