//! Controller ⇄ renderer message bridge.
//!
//! The core and the rendering surface each own their state and talk only
//! through text frames:
//!
//! ```text
//!   core                                         renderer
//!   ────                                         ────────
//!   RendererCommand ──{"command":"updateState"}──►
//!                   ──{"command":"rotateMarker"}─►
//!                   ◄──{"type":"MAP_READY"}────── BridgeMessage
//!                   ◄──USER_DRAGGED_MAP──────────
//! ```
//!
//! The channel is ordered but lossy. Nothing is acknowledged or retried; the
//! next position update resynchronizes the renderer. No command leaves the
//! core before the renderer has sent `MAP_READY` (see [`RendererLink`]).

mod command;
mod message;
mod transport;
mod websocket;

use thiserror::Error;

pub use command::{ClearKind, HostEvent, RendererCommand};
pub use message::{BridgeMessage, USER_DRAGGED_MAP};
pub use transport::{
    BridgeTransport, ChannelTransport, RendererEnd, RendererLink, DEFAULT_BRIDGE_CAPACITY,
};
pub use websocket::{WebSocketBridge, WebSocketTransport};

/// Errors on the renderer bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Inbound frame was not a known message.
    #[error("Undecodable renderer message: {0}")]
    Decode(String),

    #[error("Failed to encode renderer command: {0}")]
    Encode(String),

    /// Outbound buffer full; frame dropped.
    #[error("Renderer channel full")]
    Backpressure,

    #[error("Renderer channel closed")]
    Closed,

    #[error("Socket error: {0}")]
    Io(String),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),
}
