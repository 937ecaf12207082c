//! Receiver: collects chunks and releases the file only after `done`.

use futures_util::{Stream, StreamExt};
use roomdrop_common::TransferError;
use tracing::{debug, info, warn};

use crate::channel::Frame;
use crate::cipher::FrameCipher;
use crate::message::{ControlMessage, TransferMeta};

/// A fully received transfer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub meta: TransferMeta,
    pub data: Vec<u8>,
}

/// Outcome of feeding one frame to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    Started(TransferMeta),
    Progress { received: u64, expected: u64 },
    Completed(CompletedFile),
    /// Frame carried nothing for the current unit.
    Ignored,
}

enum State {
    Idle,
    Receiving {
        meta: TransferMeta,
        chunks: Vec<Vec<u8>>,
        received: u64,
    },
    /// The current unit was terminated; its remaining frames are discarded
    /// until the next `meta`.
    Failed,
}

pub struct TransferReceiver {
    cipher: Option<FrameCipher>,
    state: State,
}

impl TransferReceiver {
    pub fn new(cipher: Option<FrameCipher>) -> Self {
        Self {
            cipher,
            state: State::Idle,
        }
    }

    /// `(received, expected)` for the unit in flight.
    pub fn progress(&self) -> Option<(u64, u64)> {
        match &self.state {
            State::Receiving { meta, received, .. } => Some((*received, meta.size)),
            _ => None,
        }
    }

    pub fn handle_frame(&mut self, frame: Frame) -> Result<ReceiverEvent, TransferError> {
        match frame {
            Frame::Text(text) => self.handle_text(&text),
            Frame::Binary(data) => self.handle_binary(&data),
        }
    }

    pub fn handle_text(&mut self, text: &str) -> Result<ReceiverEvent, TransferError> {
        let Some(msg) = ControlMessage::parse(text) else {
            debug!("Ignoring unrecognized control text");
            return Ok(ReceiverEvent::Ignored);
        };

        match msg {
            ControlMessage::Meta(meta) => {
                if matches!(self.state, State::Receiving { .. }) {
                    warn!(name = %meta.name, "New meta before done; previous unit dropped");
                }
                if meta.encrypted && self.cipher.is_none() {
                    self.state = State::Failed;
                    return Err(TransferError::MissingKey);
                }
                info!(
                    name = %meta.name,
                    size = meta.size,
                    mime = %meta.mime_type,
                    encrypted = meta.encrypted,
                    "Receiving file"
                );
                self.state = State::Receiving {
                    meta: meta.clone(),
                    chunks: Vec::new(),
                    received: 0,
                };
                Ok(ReceiverEvent::Started(meta))
            }
            ControlMessage::Done => match std::mem::replace(&mut self.state, State::Idle) {
                State::Receiving {
                    meta,
                    chunks,
                    received,
                } => {
                    if received != meta.size {
                        self.state = State::Failed;
                        return Err(TransferError::SizeMismatch {
                            expected: meta.size,
                            received,
                        });
                    }
                    info!(name = %meta.name, bytes = received, "File received");
                    Ok(ReceiverEvent::Completed(CompletedFile {
                        meta,
                        data: chunks.concat(),
                    }))
                }
                State::Idle => Err(TransferError::Protocol("done without meta".into())),
                State::Failed => {
                    self.state = State::Failed;
                    Ok(ReceiverEvent::Ignored)
                }
            },
        }
    }

    pub fn handle_binary(&mut self, frame: &[u8]) -> Result<ReceiverEvent, TransferError> {
        let (meta, chunks, received) = match &mut self.state {
            State::Receiving {
                meta,
                chunks,
                received,
            } => (meta, chunks, received),
            State::Failed => return Ok(ReceiverEvent::Ignored),
            State::Idle => {
                return Err(TransferError::Protocol("binary frame before meta".into()));
            }
        };

        let plain = if meta.encrypted {
            let Some(cipher) = self.cipher.as_ref() else {
                self.state = State::Failed;
                return Err(TransferError::MissingKey);
            };
            match cipher.decrypt_frame(frame) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!(name = %meta.name, error = %e, "Chunk rejected; transfer terminated");
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        } else {
            frame.to_vec()
        };

        *received += plain.len() as u64;
        if *received > meta.size {
            let err = TransferError::SizeMismatch {
                expected: meta.size,
                received: *received,
            };
            self.state = State::Failed;
            return Err(err);
        }
        let event = ReceiverEvent::Progress {
            received: *received,
            expected: meta.size,
        };
        chunks.push(plain);
        Ok(event)
    }

    /// The transport went away. A unit in flight is lost for good.
    pub fn close(&mut self) -> Result<(), TransferError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Receiving { meta, received, .. } => Err(TransferError::Incomplete {
                expected: meta.size,
                received,
            }),
            _ => Ok(()),
        }
    }

    /// Consume frames until one unit completes, fails, or the stream ends.
    pub async fn receive<S>(&mut self, frames: &mut S) -> Result<CompletedFile, TransferError>
    where
        S: Stream<Item = Frame> + Unpin,
    {
        while let Some(frame) = frames.next().await {
            if let ReceiverEvent::Completed(file) = self.handle_frame(frame)? {
                return Ok(file);
            }
        }
        self.close()?;
        Err(TransferError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::TransferOptions;
    use crate::key::RoomKey;
    use crate::memory;
    use crate::sender::send_unit;

    fn meta_text(name: &str, size: u64, encrypted: bool) -> String {
        let mut meta = TransferMeta::new(name, size, None);
        meta.encrypted = encrypted;
        ControlMessage::Meta(meta).to_json().unwrap()
    }

    const DONE: &str = r#"{"type":"done"}"#;

    #[test]
    fn assembles_only_after_done() {
        let mut rx = TransferReceiver::new(None);
        assert!(matches!(
            rx.handle_text(&meta_text("a.bin", 5, false)).unwrap(),
            ReceiverEvent::Started(_)
        ));
        assert_eq!(
            rx.handle_binary(b"abc").unwrap(),
            ReceiverEvent::Progress {
                received: 3,
                expected: 5
            }
        );
        rx.handle_binary(b"de").unwrap();
        assert_eq!(rx.progress(), Some((5, 5)));

        match rx.handle_text(DONE).unwrap() {
            ReceiverEvent::Completed(file) => {
                assert_eq!(file.data, b"abcde");
                assert_eq!(file.meta.name, "a.bin");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(rx.progress(), None);
    }

    #[test]
    fn binary_before_meta_is_a_protocol_error() {
        let mut rx = TransferReceiver::new(None);
        assert!(matches!(
            rx.handle_binary(b"x"),
            Err(TransferError::Protocol(_))
        ));
    }

    #[test]
    fn unknown_text_is_ignored() {
        let mut rx = TransferReceiver::new(None);
        assert_eq!(rx.handle_text("{oops").unwrap(), ReceiverEvent::Ignored);
    }

    #[test]
    fn encrypted_meta_without_key_fails() {
        let mut rx = TransferReceiver::new(None);
        let err = rx.handle_text(&meta_text("s.bin", 4, true)).unwrap_err();
        assert!(matches!(err, TransferError::MissingKey));
        // The rest of the unit is discarded.
        assert_eq!(rx.handle_binary(b"junk").unwrap(), ReceiverEvent::Ignored);
        assert_eq!(rx.handle_text(DONE).unwrap(), ReceiverEvent::Ignored);
    }

    #[test]
    fn wrong_key_terminates_transfer() {
        let sender_cipher = FrameCipher::new(&RoomKey::generate());
        let mut rx = TransferReceiver::new(Some(FrameCipher::new(&RoomKey::generate())));
        rx.handle_text(&meta_text("s.bin", 4, true)).unwrap();

        let frame = sender_cipher.encrypt_frame(b"data").unwrap();
        assert!(matches!(
            rx.handle_binary(&frame),
            Err(TransferError::Decrypt)
        ));
        assert_eq!(rx.handle_text(DONE).unwrap(), ReceiverEvent::Ignored);
        assert!(rx.close().is_ok());
    }

    #[test]
    fn truncated_encrypted_frame_terminates_transfer() {
        let mut rx = TransferReceiver::new(Some(FrameCipher::new(&RoomKey::generate())));
        rx.handle_text(&meta_text("s.bin", 4, true)).unwrap();
        assert!(matches!(
            rx.handle_binary(&[0u8; 5]),
            Err(TransferError::TruncatedFrame(5))
        ));
    }

    #[test]
    fn short_unit_fails_at_done() {
        let mut rx = TransferReceiver::new(None);
        rx.handle_text(&meta_text("a.bin", 10, false)).unwrap();
        rx.handle_binary(b"1234").unwrap();
        assert!(matches!(
            rx.handle_text(DONE),
            Err(TransferError::SizeMismatch {
                expected: 10,
                received: 4
            })
        ));
    }

    #[test]
    fn overlong_unit_fails_immediately() {
        let mut rx = TransferReceiver::new(None);
        rx.handle_text(&meta_text("a.bin", 2, false)).unwrap();
        assert!(matches!(
            rx.handle_binary(b"123"),
            Err(TransferError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn close_mid_transfer_is_incomplete() {
        let mut rx = TransferReceiver::new(None);
        rx.handle_text(&meta_text("a.bin", 10, false)).unwrap();
        rx.handle_binary(b"12345").unwrap();
        assert!(matches!(
            rx.close(),
            Err(TransferError::Incomplete {
                expected: 10,
                received: 5
            })
        ));
        // No resumption: the state is gone.
        assert!(matches!(
            rx.handle_binary(b"67890"),
            Err(TransferError::Protocol(_))
        ));
    }

    #[test]
    fn new_meta_after_completion_starts_fresh_unit() {
        let mut rx = TransferReceiver::new(None);
        rx.handle_text(&meta_text("one", 1, false)).unwrap();
        rx.handle_binary(b"1").unwrap();
        rx.handle_text(DONE).unwrap();

        rx.handle_text(&meta_text("two", 2, false)).unwrap();
        rx.handle_binary(b"22").unwrap();
        match rx.handle_text(DONE).unwrap() {
            ReceiverEvent::Completed(file) => assert_eq!(file.meta.name, "two"),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reconstructs_exact_bytes_over_loopback() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let opts = TransferOptions {
            chunk_size: 16 * 1024,
            high_water: 64 * 1024,
            low_water: 32 * 1024,
        };
        let (tx, mut frames) = memory::pair();
        let meta = TransferMeta::new("pattern.bin", payload.len() as u64, None);

        let to_send = payload.clone();
        let sender =
            tokio::spawn(async move { send_unit(&tx, &meta, &to_send[..], None, &opts).await });

        let mut rx = TransferReceiver::new(None);
        let file = rx.receive(&mut frames).await.unwrap();
        let report = sender.await.unwrap().unwrap();

        assert_eq!(file.data.len(), payload.len());
        assert_eq!(file.data, payload);
        assert_eq!(report.frames, 7);
    }

    #[tokio::test]
    async fn reconstructs_encrypted_unit_over_loopback() {
        let key = RoomKey::generate();
        let payload = vec![0x5Au8; 40_000];
        let (tx, mut frames) = memory::pair();
        let meta = TransferMeta::new("secret.bin", payload.len() as u64, None);

        let to_send = payload.clone();
        let send_key = key.clone();
        let sender = tokio::spawn(async move {
            let cipher = FrameCipher::new(&send_key);
            send_unit(&tx, &meta, &to_send[..], Some(&cipher), &TransferOptions::default()).await
        });

        let mut rx = TransferReceiver::new(Some(FrameCipher::new(&key)));
        let file = rx.receive(&mut frames).await.unwrap();
        sender.await.unwrap().unwrap();

        assert!(file.meta.encrypted);
        assert_eq!(file.data, payload);
    }

    #[tokio::test]
    async fn dropped_transport_before_done_is_incomplete() {
        let (tx, mut frames) = memory::pair();
        {
            use crate::channel::DataChannel;
            tx.send_text(meta_text("cut.bin", 8, false)).await.unwrap();
            tx.send_binary(b"1234".to_vec()).await.unwrap();
        }
        drop(tx);

        let mut rx = TransferReceiver::new(None);
        let err = rx.receive(&mut frames).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Incomplete {
                expected: 8,
                received: 4
            }
        ));
    }
}
