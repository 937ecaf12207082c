use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters used in generated room ids. Omits `0`, `1`, `I` and `O` so
/// codes can be read aloud and typed by hand.
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random room code of `len` characters.
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..len)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client identity, stable across reconnects of the same browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id for clients that did not present one.
    pub fn random() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn generated_room_id_has_requested_length() {
        let id = RoomId::generate(10);
        assert_eq!(id.as_str().len(), 10);
    }

    #[test]
    fn generated_room_id_uses_unambiguous_alphabet() {
        for _ in 0..50 {
            let id = RoomId::generate(16);
            assert!(id.as_str().bytes().all(|b| ROOM_ID_ALPHABET.contains(&b)));
            assert!(!id.as_str().contains('0'));
            assert!(!id.as_str().contains('O'));
        }
    }

    #[test]
    fn generated_room_ids_differ() {
        assert_ne!(RoomId::generate(10), RoomId::generate(10));
    }

    #[test]
    fn client_id_random_is_uuid() {
        let cid = ClientId::random();
        assert!(uuid::Uuid::parse_str(cid.as_str()).is_ok());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let cid = ClientId::new("tab-1");
        assert_eq!(serde_json::to_string(&cid).unwrap(), "\"tab-1\"");
        let room: RoomId = serde_json::from_str("\"ABCD\"").unwrap();
        assert_eq!(room.as_str(), "ABCD");
    }

    #[test]
    fn display_matches_inner() {
        let room = RoomId::new("K7PQ");
        assert_eq!(room.to_string(), "K7PQ");
        let cid = ClientId::new("c-1");
        assert_eq!(cid.to_string(), "c-1");
    }
}
