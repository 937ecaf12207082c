//! Relay URLs and the room-creation call.

use reqwest::Url;
use roomdrop_common::{ClientId, RoomId};
use roomdrop_transfer::RoomKey;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ClientError;

pub const ENDPOINT_ENV: &str = "ROOMDROP_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787";

/// Base URL of a relay, always `http` or `https` with no path.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRoom {
    room_id: RoomId,
}

impl Endpoint {
    /// Accepts `http(s)://` or `ws(s)://`. Path, query and fragment are
    /// dropped.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let mut base =
            Url::parse(raw.trim()).map_err(|e| ClientError::Endpoint(format!("{raw}: {e}")))?;
        let scheme = match base.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(ClientError::Endpoint(format!("unsupported scheme `{other}`")));
            }
        };
        base.set_scheme(scheme)
            .map_err(|()| ClientError::Endpoint(format!("cannot switch {raw} to {scheme}")))?;
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    /// `--endpoint`, then `$ROOMDROP_ENDPOINT`, then the local default.
    pub fn resolve(flag: Option<&str>) -> Result<Self, ClientError> {
        match flag {
            Some(raw) => Self::parse(raw),
            None => match std::env::var(ENDPOINT_ENV) {
                Ok(raw) if !raw.trim().is_empty() => Self::parse(&raw),
                _ => Self::parse(DEFAULT_ENDPOINT),
            },
        }
    }

    pub fn signaling_url(&self, room: &RoomId, client: &ClientId) -> Url {
        let mut url = self.base.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http -> ws keeps the URL special, so this cannot fail.
        let _ = url.set_scheme(scheme);
        url.set_path(&format!("/ws/{room}"));
        url.query_pairs_mut().append_pair("cid", client.as_str());
        url
    }

    /// Browser link for the room, carrying the key in the fragment.
    pub fn share_link(&self, room: &RoomId, key: Option<&RoomKey>) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("/r/{room}"));
        if let Some(key) = key {
            url.set_fragment(Some(&key.to_fragment()));
        }
        url.to_string()
    }

    /// `POST /api/rooms`. With a `creator`, only that client may offer.
    pub async fn create_room(
        &self,
        max_concurrent: Option<u32>,
        creator: Option<&ClientId>,
    ) -> Result<RoomId, ClientError> {
        let mut body = Map::new();
        if let Some(max) = max_concurrent {
            body.insert("maxConcurrent".into(), max.into());
        }
        if let Some(cid) = creator {
            body.insert("creatorCid".into(), cid.as_str().into());
        }

        let mut url = self.base.clone();
        url.set_path("/api/rooms");
        let created: CreatedRoom = reqwest::Client::new()
            .post(url)
            .json(&Value::Object(body))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(created.room_id)
    }
}

/// A room given on the command line: a bare code or a share link. Links
/// may carry the key in their fragment.
pub fn parse_room_arg(arg: &str) -> Result<(RoomId, Option<RoomKey>), ClientError> {
    let arg = arg.trim();
    let Ok(url) = Url::parse(arg) else {
        return Ok((RoomId::new(arg), None));
    };
    let room = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .ok_or_else(|| ClientError::Endpoint(format!("no room code in {arg}")))?;
    let key = match url.fragment() {
        Some(fragment) => RoomKey::from_fragment(fragment)?,
        None => None,
    };
    Ok((RoomId::new(room), key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_endpoints_map_to_http() {
        let ep = Endpoint::parse("wss://drop.example.com/some/path?x=1#frag").unwrap();
        assert_eq!(ep.base.as_str(), "https://drop.example.com/");
        let ep = Endpoint::parse("ws://127.0.0.1:9000").unwrap();
        assert_eq!(ep.base.as_str(), "http://127.0.0.1:9000/");
        assert!(Endpoint::parse("ftp://example.com").is_err());
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn signaling_url_carries_room_and_cid() {
        let ep = Endpoint::parse("https://drop.example.com").unwrap();
        let url = ep.signaling_url(&RoomId::new("ABCDEFGHJK"), &ClientId::new("c 1"));
        assert_eq!(url.as_str(), "wss://drop.example.com/ws/ABCDEFGHJK?cid=c+1");

        let ep = Endpoint::parse("http://127.0.0.1:8787").unwrap();
        let url = ep.signaling_url(&RoomId::new("ROOM234567"), &ClientId::new("x"));
        assert_eq!(url.as_str(), "ws://127.0.0.1:8787/ws/ROOM234567?cid=x");
    }

    #[test]
    fn share_link_round_trips_through_room_arg() {
        let ep = Endpoint::parse("https://drop.example.com").unwrap();
        let key = RoomKey::generate();
        let link = ep.share_link(&RoomId::new("LINKROOM23"), Some(&key));
        assert!(link.starts_with("https://drop.example.com/r/LINKROOM23#k="));

        let (room, parsed) = parse_room_arg(&link).unwrap();
        assert_eq!(room, RoomId::new("LINKROOM23"));
        assert_eq!(parsed, Some(key));
    }

    #[test]
    fn bare_room_code_has_no_key() {
        let (room, key) = parse_room_arg(" PLAINROOM2 ").unwrap();
        assert_eq!(room, RoomId::new("PLAINROOM2"));
        assert!(key.is_none());

        let ep = Endpoint::parse("http://localhost:8787").unwrap();
        let (room, key) =
            parse_room_arg(&ep.share_link(&RoomId::new("NOKEYROOM2"), None)).unwrap();
        assert_eq!(room, RoomId::new("NOKEYROOM2"));
        assert!(key.is_none());
    }
}
