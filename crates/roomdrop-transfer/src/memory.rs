//! In-process loopback channel.
//!
//! Behaves like an ordered data channel whose buffered amount is the bytes
//! sent but not yet taken by the other end. Used to run a sender and a
//! receiver in the same process.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use roomdrop_common::TransferError;
use tokio::sync::{mpsc, Notify};

use crate::channel::{DataChannel, Frame};

struct Shared {
    buffered: AtomicUsize,
    closed: AtomicBool,
    drained: Notify,
}

/// Sending half.
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Frame>,
    shared: Arc<Shared>,
}

/// Receiving half. Dropping it closes the channel.
pub struct MemoryEndpoint {
    rx: mpsc::UnboundedReceiver<Frame>,
    shared: Arc<Shared>,
}

/// Create a connected loopback pair.
pub fn pair() -> (MemoryChannel, MemoryEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        buffered: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
        drained: Notify::new(),
    });
    (
        MemoryChannel {
            tx,
            shared: Arc::clone(&shared),
        },
        MemoryEndpoint { rx, shared },
    )
}

impl MemoryChannel {
    fn push(&self, frame: Frame) -> Result<(), TransferError> {
        let len = frame.len();
        self.shared.buffered.fetch_add(len, Ordering::AcqRel);
        if self.tx.send(frame).is_err() {
            self.shared.buffered.fetch_sub(len, Ordering::AcqRel);
            return Err(TransferError::ChannelClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl DataChannel for MemoryChannel {
    async fn send_text(&self, text: String) -> Result<(), TransferError> {
        self.push(Frame::Text(text))
    }

    async fn send_binary(&self, data: Vec<u8>) -> Result<(), TransferError> {
        self.push(Frame::Binary(data))
    }

    fn buffered_amount(&self) -> usize {
        self.shared.buffered.load(Ordering::Acquire)
    }

    async fn buffered_amount_low(&self, threshold: usize) {
        loop {
            // Register before checking so a drain between the check and the
            // await is not missed.
            let notified = self.shared.drained.notified();
            if self.shared.closed.load(Ordering::Acquire)
                || self.shared.buffered.load(Ordering::Acquire) <= threshold
            {
                return;
            }
            notified.await;
        }
    }
}

impl MemoryEndpoint {
    pub async fn recv(&mut self) -> Option<Frame> {
        let frame = self.rx.recv().await?;
        self.consumed(&frame);
        Some(frame)
    }

    fn consumed(&self, frame: &Frame) {
        self.shared.buffered.fetch_sub(frame.len(), Ordering::AcqRel);
        self.shared.drained.notify_waiters();
    }
}

impl Stream for MemoryEndpoint {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                this.consumed(&frame);
                Poll::Ready(Some(frame))
            }
            other => other,
        }
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.drained.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_amount_tracks_unread_bytes() {
        let (tx, mut rx) = pair();
        tx.send_binary(vec![0u8; 10]).await.unwrap();
        tx.send_text("abc".into()).await.unwrap();
        assert_eq!(tx.buffered_amount(), 13);

        assert_eq!(rx.recv().await, Some(Frame::Binary(vec![0u8; 10])));
        assert_eq!(tx.buffered_amount(), 3);
        assert_eq!(rx.recv().await, Some(Frame::Text("abc".into())));
        assert_eq!(tx.buffered_amount(), 0);
    }

    #[tokio::test]
    async fn low_resolves_after_drain() {
        let (tx, mut rx) = pair();
        tx.send_binary(vec![0u8; 100]).await.unwrap();

        let waiter = tokio::spawn(async move {
            tx.buffered_amount_low(0).await;
            tx
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        rx.recv().await.unwrap();
        let tx = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.buffered_amount(), 0);
    }

    #[tokio::test]
    async fn dropping_endpoint_closes_channel() {
        let (tx, rx) = pair();
        tx.send_binary(vec![1u8; 8]).await.unwrap();
        drop(rx);

        // Waiting on a dead channel must not hang.
        tx.buffered_amount_low(0).await;
        let err = tx.send_text("late".into()).await.unwrap_err();
        assert!(matches!(err, TransferError::ChannelClosed));
    }

    #[tokio::test]
    async fn recv_returns_none_after_sender_drop() {
        let (tx, mut rx) = pair();
        tx.send_text("last".into()).await.unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Some(Frame::Text("last".into())));
        assert_eq!(rx.recv().await, None);
    }
}
