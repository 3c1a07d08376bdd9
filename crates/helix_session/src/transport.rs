//! The outbound half of the relay connection. A `SessionManager` never
//! touches a socket directly; it sends `RelayFrame`s through a `Transport`
//! and the implementation owns whatever connection is underneath.
//!
//! The relay itself injects `senderId` on every frame it forwards, so a
//! `Transport` impl is expected to stamp it rather than trust a caller to
//! set it correctly.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use helix_proto::RelayFrame;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("transport io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: RelayFrame) -> Result<(), TransportError>;
}

/// An in-process stand-in for the relay connection, used by tests to drive
/// two `SessionManager`s against each other without a real socket.
///
/// Mirrors what the real relay does to every frame it forwards: it stamps
/// `senderId` with the sending peer's registered identifier before handing
/// the frame to the other side.
pub struct InMemoryTransport {
    local_id: String,
    peer_tx: mpsc::UnboundedSender<RelayFrame>,
}

impl InMemoryTransport {
    /// Build a connected pair: sending through `a` delivers to `b`'s
    /// receiver and vice versa.
    pub fn pair(
        a_id: impl Into<String>,
        b_id: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<RelayFrame>, Self, mpsc::UnboundedReceiver<RelayFrame>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = Self {
            local_id: a_id.into(),
            peer_tx: tx_b,
        };
        let b = Self {
            local_id: b_id.into(),
            peer_tx: tx_a,
        };
        (a, rx_a, b, rx_b)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, mut frame: RelayFrame) -> Result<(), TransportError> {
        frame.sender_id = Some(self.local_id.clone());
        self.peer_tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_proto::frame_type;

    #[tokio::test]
    async fn stamps_sender_id_on_delivery() {
        let (a, _rx_a, _b, mut rx_b) = InMemoryTransport::pair("alice", "bob");
        let frame = RelayFrame::new(frame_type::TYPING_START, serde_json::json!({}), Some("bob".into()));
        a.send(frame).await.unwrap();
        let received = rx_b.recv().await.unwrap();
        assert_eq!(received.sender_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn send_after_drop_errors() {
        let (a, rx_a, _b, _rx_b) = InMemoryTransport::pair("alice", "bob");
        drop(rx_a);
        let frame = RelayFrame::new(frame_type::TYPING_STOP, serde_json::json!({}), None);
        assert!(a.send(frame).await.is_err());
    }
}
