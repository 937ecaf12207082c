//! The byte-stream-like channel a transfer runs over.
//!
//! Negotiating the channel is someone else's job; by the time a transfer
//! starts the pairing is active and the channel is open.

use async_trait::async_trait;
use roomdrop_common::TransferError;

/// One message on the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON control message.
    Text(String),
    /// File chunk, sealed or plain depending on `meta.encrypted`.
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sending half of an open, ordered data channel.
#[async_trait]
pub trait DataChannel: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), TransferError>;

    async fn send_binary(&self, data: Vec<u8>) -> Result<(), TransferError>;

    /// Bytes accepted by the channel but not yet delivered to the peer.
    fn buffered_amount(&self) -> usize;

    /// Resolve once `buffered_amount()` is at or below `threshold`.
    async fn buffered_amount_low(&self, threshold: usize);
}
