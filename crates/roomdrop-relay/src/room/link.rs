//! Outbound side of one socket, as seen from the room actor.

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::protocol::ServerMessage;

/// Why the relay closed a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The same client id joined again on another socket.
    Replaced,
    /// The outbox filled up.
    SlowConsumer,
}

impl CloseReason {
    /// WebSocket close code and reason text.
    pub fn frame(self) -> (u16, &'static str) {
        match self {
            CloseReason::Replaced => (1000, "replaced"),
            CloseReason::SlowConsumer => (1008, "slow consumer"),
        }
    }
}

/// Bounded outbox plus a close signal.
///
/// Sends never block the room: a full outbox evicts the connection instead.
#[derive(Debug)]
pub struct Link {
    outbox: mpsc::Sender<String>,
    close: watch::Sender<Option<CloseReason>>,
}

impl Link {
    /// Create a link and the socket-side receivers for it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>, watch::Receiver<Option<CloseReason>>) {
        let (outbox, outbox_rx) = mpsc::channel(capacity.max(1));
        let (close, close_rx) = watch::channel(None);
        (Self { outbox, close }, outbox_rx, close_rx)
    }

    pub fn send(&self, message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode server message");
                return;
            }
        };
        match self.outbox.try_send(json) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbox full, evicting connection");
                self.close(CloseReason::SlowConsumer);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbox closed, socket already gone");
            }
        }
    }

    /// Ask the socket task to close. The first reason sticks.
    pub fn close(&self, reason: CloseReason) {
        self.close.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_queues_json() {
        let (link, mut rx, _close) = Link::new(4);
        link.send(&ServerMessage::Wait);
        assert_eq!(rx.try_recv().unwrap(), r#"{"type":"wait"}"#);
    }

    #[test]
    fn full_outbox_evicts() {
        let (link, _rx, close) = Link::new(1);
        link.send(&ServerMessage::Wait);
        assert_eq!(*close.borrow(), None);
        link.send(&ServerMessage::Wait);
        assert_eq!(*close.borrow(), Some(CloseReason::SlowConsumer));
    }

    #[test]
    fn first_close_reason_sticks() {
        let (link, _rx, close) = Link::new(4);
        link.close(CloseReason::Replaced);
        link.close(CloseReason::SlowConsumer);
        assert_eq!(*close.borrow(), Some(CloseReason::Replaced));
    }

    #[test]
    fn send_after_socket_gone_is_quiet() {
        let (link, rx, close) = Link::new(4);
        drop(rx);
        link.send(&ServerMessage::Wait);
        assert_eq!(*close.borrow(), None);
    }
}
