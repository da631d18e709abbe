//! Transport Abstraction
//!
//! The registry only needs two things from a connection: whether it is still
//! open, and a fire-and-forget send primitive.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// A persistent bidirectional connection as seen by the broadcaster
pub trait Transport: Send + Sync {
    /// Whether the connection can still accept outbound messages
    fn is_open(&self) -> bool;

    /// Queue a text message for delivery. Does not wait for the peer.
    fn send(&self, text: Arc<str>) -> Result<(), TransportError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,
}

/// Transport backed by the outbound channel of a WebSocket writer task.
///
/// The channel is open for as long as the writer task holds the receiver,
/// so the channel state doubles as the socket state.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<Arc<str>>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its writer task should drain
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<str>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    fn send(&self, text: Arc<str>) -> Result<(), TransportError> {
        self.sender.send(text).map_err(|_| TransportError::Closed)
    }
}
