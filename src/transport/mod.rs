pub mod websocket;

pub use websocket::WebSocketTransport;

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Push notifications a transport delivers to its owner.
///
/// `Message` frames arrive strictly in wire order, one complete logical
/// message per event; the transport never parses the payload.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

/// Abstract duplex text channel to the gateway.
///
/// One concrete binding is [`WebSocketTransport`]; tests substitute an
/// in-memory implementation. `send` must be callable from any task once the
/// `Connected` notification has been observed, and each send is atomic with
/// respect to other sends.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel. Notifications, starting with `Connected`, arrive on
    /// the returned receiver.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Queue one text frame. Fails with `JanusError::NotConnected` before
    /// `Connected` or after `Closed`.
    async fn send(&self, text: String) -> Result<()>;

    /// Close the channel; a `Closed` notification follows.
    async fn close(&self) -> Result<()>;
}
