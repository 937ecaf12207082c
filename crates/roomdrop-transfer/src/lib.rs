//! Chunked file transfer over an established peer-to-peer data channel.
//!
//! A transfer unit is one `meta` control message, a run of bounded binary
//! frames, and one `done` control message. Frames are optionally sealed
//! with AES-256-GCM, each under its own random nonce, so every frame can be
//! decrypted on its own. The sender honours high/low-water backpressure on
//! the channel's buffered byte count.

pub mod channel;
pub mod cipher;
pub mod flow;
pub mod key;
pub mod memory;
pub mod message;
pub mod receiver;
pub mod sender;

pub use channel::{DataChannel, Frame};
pub use cipher::{FrameCipher, NONCE_LEN};
pub use flow::{FlowControl, TransferOptions};
pub use key::{RoomKey, KEY_LEN};
pub use message::{ControlMessage, TransferMeta, DEFAULT_MIME};
pub use receiver::{CompletedFile, ReceiverEvent, TransferReceiver};
pub use sender::{send_file, send_unit, SendReport};
