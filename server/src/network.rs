//! Server network layer: WebSocket accept loop and the relay event loop

use crate::relay::{Relay, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_packet, encode_packet, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Relay server: accepts WebSocket connections and applies their events
/// to the shared state one at a time.
pub struct Server {
    listener: TcpListener,
    relay: Relay,

    // Connection tasks -> relay loop
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener. Pass port 0 to let the OS pick one and read it
    /// back with `local_addr`.
    pub async fn new(addr: &str, max_clients: usize) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Relay listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            relay: Relay::new(max_clients),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until every sender to the relay loop is gone.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            mut relay,
            server_tx,
            mut server_rx,
        } = self;

        spawn_acceptor(listener, server_tx);
        info!("Relay started");

        while let Some(message) = server_rx.recv().await {
            relay.handle_message(message);
        }

        info!("Relay shutting down");
        Ok(())
    }
}

/// Spawns the task that accepts TCP connections and upgrades them
fn spawn_acceptor(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_connection(stream, addr, server_tx.clone()));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    });
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut frames) = ws.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();
    let (reply_tx, reply_rx) = oneshot::channel();

    let connect = ServerMessage::Connect {
        addr,
        outbound: outbound_tx,
        reply: reply_tx,
    };
    if server_tx.send(connect).is_err() {
        error!("Relay loop is gone, dropping connection from {}", addr);
        return;
    }

    // Runs until the relay drops this connection's queue.
    let writer = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            let bytes = match encode_packet(&packet) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Failed to encode packet: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Binary(bytes)).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let Some(client_id) = reply_rx.await.ok().flatten() else {
        let _ = writer.await;
        return;
    };

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Binary(bytes)) => match decode_packet(&bytes) {
                Ok(packet) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived { client_id, packet })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => warn!("Dropping frame from client {}: {}", client_id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection error for client {}: {}", client_id, e);
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::Disconnect { client_id });
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::Stream;
    use tokio::time::timeout;
    use tokio_test::assert_ok;
    use tokio_tungstenite::connect_async;

    async fn start_server(max_clients: usize) -> SocketAddr {
        let server = assert_ok!(Server::new("127.0.0.1:0", max_clients).await);
        let addr = assert_ok!(server.local_addr());
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn next_packet<S>(frames: &mut S) -> Packet
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = timeout(Duration::from_secs(2), frames.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Binary(bytes) = frame {
                return decode_packet(&bytes).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_handshake_delivers_welcome() {
        let addr = start_server(4).await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        assert_eq!(next_packet(&mut ws).await, Packet::Welcome { client_id: 1 });
        assert!(matches!(
            next_packet(&mut ws).await,
            Packet::CurrentPlayers { .. }
        ));
    }

    #[tokio::test]
    async fn test_garbage_frame_is_dropped_not_fatal() {
        let addr = start_server(4).await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        for _ in 0..4 {
            next_packet(&mut ws).await;
        }

        ws.send(Message::Binary(vec![0xFF, 0x00, 0x13])).await.unwrap();
        ws.send(Message::Text("not a packet".to_string()))
            .await
            .unwrap();
        let claim = encode_packet(&Packet::CollectCoin { index: 0 }).unwrap();
        ws.send(Message::Binary(claim)).await.unwrap();

        assert_eq!(
            next_packet(&mut ws).await,
            Packet::CoinCollected {
                index: 0,
                collector: 1
            }
        );
    }

    #[tokio::test]
    async fn test_full_server_rejects_and_closes() {
        let addr = start_server(1).await;
        let (mut first, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert_eq!(next_packet(&mut first).await, Packet::Welcome { client_id: 1 });

        let (mut second, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        assert_eq!(
            next_packet(&mut second).await,
            Packet::Rejected {
                reason: "Server full".to_string()
            }
        );
    }
}
