//! Bridge transports and the readiness gate.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::command::RendererCommand;
use super::BridgeError;
use crate::routing::BoxFuture;

/// Default frame buffer per direction.
pub const DEFAULT_BRIDGE_CAPACITY: usize = 64;

/// A text-frame channel to the rendering surface.
///
/// Delivery is ordered but lossy: `send` never waits, and a frame that cannot
/// be queued is reported as an error and dropped.
pub trait BridgeTransport: Send {
    /// Queue one frame for the renderer.
    fn send(&mut self, frame: String) -> Result<(), BridgeError>;

    /// Next frame from the renderer, `None` once the renderer is gone.
    ///
    /// Must be cancel-safe: dropping the future loses no frame.
    fn recv(&mut self) -> BoxFuture<'_, Option<String>>;
}

/// In-process transport backed by two bounded channels.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
}

/// The renderer's side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct RendererEnd {
    /// Frames the core sent.
    pub commands: mpsc::Receiver<String>,
    /// Frames to deliver to the core.
    pub messages: mpsc::Sender<String>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<String>) -> Self {
        Self { outbound, inbound }
    }

    /// Create a connected transport and renderer end.
    pub fn pair(capacity: usize) -> (Self, RendererEnd) {
        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        (
            Self::new(out_tx, in_rx),
            RendererEnd {
                commands: out_rx,
                messages: in_tx,
            },
        )
    }
}

impl BridgeTransport for ChannelTransport {
    fn send(&mut self, frame: String) -> Result<(), BridgeError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => BridgeError::Backpressure,
            TrySendError::Closed(_) => BridgeError::Closed,
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<String>> {
        Box::pin(self.inbound.recv())
    }
}

/// Readiness-gated command sink.
///
/// Commands issued before the renderer reports `MAP_READY` are dropped rather
/// than queued: the renderer resynchronizes from the next position update.
#[derive(Debug)]
pub struct RendererLink<T> {
    transport: T,
    ready: bool,
    sent: u64,
    dropped: u64,
}

impl<T: BridgeTransport> RendererLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            ready: false,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// The renderer went away or reloaded; gate commands again.
    pub fn mark_lost(&mut self) {
        self.ready = false;
    }

    /// Commands delivered to the transport.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Commands dropped (not ready, encode failure, full or closed channel).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Send a command if the renderer is ready. Returns whether it was queued.
    pub fn send(&mut self, command: &RendererCommand) -> bool {
        if !self.ready {
            self.dropped += 1;
            debug!(command = command.name(), "Renderer not ready, command dropped");
            return false;
        }

        let result = command
            .to_json()
            .and_then(|frame| self.transport.send(frame));

        match result {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                self.dropped += 1;
                warn!(command = command.name(), error = %e, "Renderer command dropped");
                false
            }
        }
    }

    pub fn send_all(&mut self, commands: impl IntoIterator<Item = RendererCommand>) {
        for command in commands {
            self.send(&command);
        }
    }

    /// Next raw frame from the renderer.
    pub fn recv(&mut self) -> BoxFuture<'_, Option<String>> {
        self.transport.recv()
    }
}
