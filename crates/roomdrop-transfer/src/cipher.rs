//! Per-frame AES-256-GCM.
//!
//! Frame layout: `nonce (12 bytes) || ciphertext+tag`. No state carries
//! between frames.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use roomdrop_common::TransferError;

use crate::key::RoomKey;

pub const NONCE_LEN: usize = 12;

/// Stateless encryption context holding one room key.
pub struct FrameCipher {
    cipher: Aes256Gcm,
}

impl FrameCipher {
    pub fn new(key: &RoomKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Seal one chunk under a fresh random nonce.
    pub fn encrypt_frame(&self, plaintext: &[u8]) -> Result<Vec<u8>, TransferError> {
        let mut iv = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);
        let ct = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| TransferError::Encrypt)?;

        let mut frame = Vec::with_capacity(NONCE_LEN + ct.len());
        frame.extend_from_slice(&iv);
        frame.extend_from_slice(&ct);
        Ok(frame)
    }

    /// Split the nonce off `frame` and open the rest.
    pub fn decrypt_frame(&self, frame: &[u8]) -> Result<Vec<u8>, TransferError> {
        if frame.len() < NONCE_LEN {
            return Err(TransferError::TruncatedFrame(frame.len()));
        }
        let (iv, ct) = frame.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(iv);
        self.cipher
            .decrypt(nonce, ct)
            .map_err(|_| TransferError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_same_key() {
        let key = RoomKey::generate();
        let cipher = FrameCipher::new(&key);
        let plain = b"sixteen kibibytes of something".to_vec();
        let frame = cipher.encrypt_frame(&plain).unwrap();
        assert_eq!(cipher.decrypt_frame(&frame).unwrap(), plain);
    }

    #[test]
    fn frame_is_nonce_plus_ciphertext_and_tag() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let frame = cipher.encrypt_frame(&[0u8; 100]).unwrap();
        assert_eq!(frame.len(), NONCE_LEN + 100 + 16);
    }

    #[test]
    fn nonces_are_fresh_per_frame() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let a = cipher.encrypt_frame(b"same").unwrap();
        let b = cipher.encrypt_frame(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let frame = FrameCipher::new(&RoomKey::generate())
            .encrypt_frame(b"secret")
            .unwrap();
        let err = FrameCipher::new(&RoomKey::generate())
            .decrypt_frame(&frame)
            .unwrap_err();
        assert!(matches!(err, TransferError::Decrypt));
    }

    #[test]
    fn truncated_frame_fails() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let err = cipher.decrypt_frame(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, TransferError::TruncatedFrame(3)));
    }

    #[test]
    fn nonce_only_frame_fails() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let err = cipher.decrypt_frame(&[0u8; NONCE_LEN]).unwrap_err();
        assert!(matches!(err, TransferError::Decrypt));
    }

    #[test]
    fn tampered_frame_fails() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let mut frame = cipher.encrypt_frame(b"payload").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(
            cipher.decrypt_frame(&frame),
            Err(TransferError::Decrypt)
        ));
    }

    #[test]
    fn frames_decrypt_out_of_order() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let first = cipher.encrypt_frame(b"first").unwrap();
        let second = cipher.encrypt_frame(b"second").unwrap();
        assert_eq!(cipher.decrypt_frame(&second).unwrap(), b"second");
        assert_eq!(cipher.decrypt_frame(&first).unwrap(), b"first");
    }

    #[test]
    fn empty_chunk_roundtrips() {
        let cipher = FrameCipher::new(&RoomKey::generate());
        let frame = cipher.encrypt_frame(&[]).unwrap();
        assert!(cipher.decrypt_frame(&frame).unwrap().is_empty());
    }
}
