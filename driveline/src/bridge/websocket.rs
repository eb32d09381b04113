//! WebSocket transport for an out-of-process renderer.
//!
//! The core listens, the renderer connects. One connection is served per
//! [`WebSocketBridge::accept`]; frames are pumped between the socket and a
//! [`ChannelTransport`] by two tasks that are aborted when the transport is
//! dropped.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::transport::{BridgeTransport, ChannelTransport};
use super::BridgeError;
use crate::routing::BoxFuture;

/// Listening side of the WebSocket bridge.
#[derive(Debug)]
pub struct WebSocketBridge {
    listener: TcpListener,
}

impl WebSocketBridge {
    /// Bind the listener.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Io(e.to_string()))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        self.listener
            .local_addr()
            .map_err(|e| BridgeError::Io(e.to_string()))
    }

    /// Wait for a renderer to connect and complete the WebSocket handshake.
    pub async fn accept(&self, capacity: usize) -> Result<WebSocketTransport, BridgeError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| BridgeError::Io(e.to_string()))?;

        let socket = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| BridgeError::Handshake(e.to_string()))?;
        info!(%peer, "Renderer connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(capacity.max(1));
        let (in_tx, in_rx) = mpsc::channel::<String>(capacity.max(1));

        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%peer, error = %e, "Renderer socket read failed");
                        break;
                    }
                }
            }
            debug!(%peer, "Renderer reader finished");
        });

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    warn!(%peer, error = %e, "Renderer socket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
            debug!(%peer, "Renderer writer finished");
        });

        Ok(WebSocketTransport {
            channel: ChannelTransport::new(out_tx, in_rx),
            peer,
            reader,
            writer,
        })
    }
}

/// One accepted renderer connection.
#[derive(Debug)]
pub struct WebSocketTransport {
    channel: ChannelTransport,
    peer: SocketAddr,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WebSocketTransport {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl BridgeTransport for WebSocketTransport {
    fn send(&mut self, frame: String) -> Result<(), BridgeError> {
        self.channel.send(frame)
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<String>> {
        self.channel.recv()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
