//! Room keys: the out-of-band secret shared through the link fragment.
//!
//! The relay never sees these. A sender that creates an encrypted room puts
//! `#k=<base64url>` in the share link; every receiver reads it back from the
//! fragment of the same link.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use roomdrop_common::{RoomId, TransferError};
use sha2::Sha256;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

const PBKDF2_ROUNDS: u32 = 100_000;
const PBKDF2_SALT_PREFIX: &str = "roomdrop-room-key-v1:";

#[derive(Clone, PartialEq, Eq)]
pub struct RoomKey([u8; KEY_LEN]);

impl RoomKey {
    /// A fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransferError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            TransferError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Decode a base64url key. Trailing `=` padding is tolerated.
    pub fn from_base64url(encoded: &str) -> Result<Self, TransferError> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|e| TransferError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&raw)
    }

    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Extract the `k` parameter from a URL fragment such as `#k=...&x=1`.
    /// Returns `Ok(None)` when the fragment carries no key.
    pub fn from_fragment(fragment: &str) -> Result<Option<Self>, TransferError> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        fragment
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == "k")
            .map(|(_, value)| Self::from_base64url(value))
            .transpose()
    }

    /// Fragment form, without the leading `#`.
    pub fn to_fragment(&self) -> String {
        format!("k={}", self.to_base64url())
    }

    /// Stretch a human passphrase into a room key via PBKDF2-HMAC-SHA256.
    /// The room id salts the derivation so one passphrase yields different
    /// keys in different rooms.
    pub fn derive_from_passphrase(passphrase: &str, room: &RoomId) -> Self {
        let salt = format!("{PBKDF2_SALT_PREFIX}{room}");
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_roundtrip() {
        let key = RoomKey::generate();
        let encoded = key.to_base64url();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(RoomKey::from_base64url(&encoded).unwrap(), key);
    }

    #[test]
    fn padded_input_is_accepted() {
        let key = RoomKey::generate();
        let padded = format!("{}=", key.to_base64url());
        assert_eq!(RoomKey::from_base64url(&padded).unwrap(), key);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let short = URL_SAFE_NO_PAD.encode([7u8; 16]);
        let err = RoomKey::from_base64url(&short).unwrap_err();
        assert!(matches!(err, TransferError::InvalidKey(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(RoomKey::from_base64url("***").is_err());
    }

    #[test]
    fn fragment_with_key() {
        let key = RoomKey::generate();
        let fragment = format!("#{}", key.to_fragment());
        assert_eq!(RoomKey::from_fragment(&fragment).unwrap(), Some(key));
    }

    #[test]
    fn fragment_with_other_params() {
        let key = RoomKey::generate();
        let fragment = format!("view=list&k={}&x", key.to_base64url());
        assert_eq!(RoomKey::from_fragment(&fragment).unwrap(), Some(key));
    }

    #[test]
    fn fragment_without_key() {
        assert_eq!(RoomKey::from_fragment("#view=list").unwrap(), None);
        assert_eq!(RoomKey::from_fragment("").unwrap(), None);
    }

    #[test]
    fn fragment_with_bad_key_errors() {
        assert!(RoomKey::from_fragment("#k=abc").is_err());
    }

    #[test]
    fn passphrase_derivation_is_deterministic_per_room() {
        let room_a = RoomId::new("ROOMAAAAAA");
        let room_b = RoomId::new("ROOMBBBBBB");
        let a1 = RoomKey::derive_from_passphrase("correct horse", &room_a);
        let a2 = RoomKey::derive_from_passphrase("correct horse", &room_a);
        let b = RoomKey::derive_from_passphrase("correct horse", &room_b);
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = RoomKey::from_bytes(&[0xAB; KEY_LEN]).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("171"));
        assert!(!debug.to_lowercase().contains("ab"));
    }
}
