//! Signaling wire protocol. Negotiation payloads (`sdp`, `candidate`) are
//! opaque JSON and are forwarded untouched.

use roomdrop_common::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::room::Role;

/// Messages a client sends to the relay.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "offer")]
    Offer { to: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "answer")]
    Answer { to: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "candidate")]
    Candidate {
        to: ClientId,
        sid: u64,
        candidate: Value,
    },

    #[serde(rename = "transfer-done")]
    TransferDone {
        #[serde(rename = "peerId")]
        peer_id: ClientId,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// For negotiation messages, the recipient and the message to deliver
    /// to it, stamped with the sender's id.
    pub fn into_signal(self, from: &ClientId) -> Option<(ClientId, ServerMessage)> {
        let from = from.clone();
        match self {
            ClientMessage::Offer { to, sid, sdp } => Some((to, ServerMessage::Offer { from, sid, sdp })),
            ClientMessage::Answer { to, sid, sdp } => {
                Some((to, ServerMessage::Answer { from, sid, sdp }))
            }
            ClientMessage::Candidate { to, sid, candidate } => Some((
                to,
                ServerMessage::Candidate {
                    from,
                    sid,
                    candidate,
                },
            )),
            ClientMessage::TransferDone { .. } => None,
        }
    }
}

/// Messages the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "role")]
    Role { role: Role, cid: ClientId },

    #[serde(rename = "peers")]
    Peers { count: usize },

    #[serde(rename = "wait")]
    Wait,

    #[serde(rename = "start")]
    Start {
        #[serde(rename = "peerId", skip_serializing_if = "Option::is_none")]
        peer_id: Option<ClientId>,
    },

    #[serde(rename = "peer-left")]
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: ClientId,
    },

    #[serde(rename = "offer")]
    Offer { from: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "answer")]
    Answer { from: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "candidate")]
    Candidate {
        from: ClientId,
        sid: u64,
        candidate: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(msg: &ServerMessage) -> Value {
        serde_json::to_value(msg).unwrap()
    }

    #[test]
    fn status_messages_wire_shape() {
        assert_eq!(
            wire(&ServerMessage::Role {
                role: Role::Answerer,
                cid: ClientId::new("c1")
            }),
            json!({"type": "role", "role": "answerer", "cid": "c1"})
        );
        assert_eq!(wire(&ServerMessage::Wait), json!({"type": "wait"}));
        assert_eq!(
            wire(&ServerMessage::Peers { count: 3 }),
            json!({"type": "peers", "count": 3})
        );
        assert_eq!(
            wire(&ServerMessage::PeerLeft {
                peer_id: ClientId::new("a1")
            }),
            json!({"type": "peer-left", "peerId": "a1"})
        );
    }

    #[test]
    fn start_omits_peer_for_answerer() {
        assert_eq!(
            wire(&ServerMessage::Start { peer_id: None }),
            json!({"type": "start"})
        );
        assert_eq!(
            wire(&ServerMessage::Start {
                peer_id: Some(ClientId::new("a1"))
            }),
            json!({"type": "start", "peerId": "a1"})
        );
    }

    #[test]
    fn parses_negotiation_messages() {
        let msg = ClientMessage::parse(
            r#"{"type":"offer","to":"a1","sid":7,"sdp":{"type":"offer","sdp":"v=0"}}"#,
        )
        .unwrap();
        let (to, forward) = msg.into_signal(&ClientId::new("o1")).unwrap();
        assert_eq!(to, ClientId::new("a1"));
        assert_eq!(
            wire(&forward),
            json!({"type": "offer", "from": "o1", "sid": 7, "sdp": {"type": "offer", "sdp": "v=0"}})
        );
    }

    #[test]
    fn candidate_payload_passes_through_untouched() {
        let raw = r#"{"type":"candidate","to":"o1","sid":2,"candidate":{"candidate":"candidate:1 1 udp 2122260223 10.0.0.2 54400 typ host","sdpMid":"0","sdpMLineIndex":0,"extra":[1,2]}}"#;
        let (to, forward) = ClientMessage::parse(raw)
            .unwrap()
            .into_signal(&ClientId::new("a1"))
            .unwrap();
        assert_eq!(to.as_str(), "o1");
        let v = wire(&forward);
        assert_eq!(v["from"], "a1");
        assert_eq!(v["candidate"]["extra"], json!([1, 2]));
    }

    #[test]
    fn parses_transfer_done() {
        let msg = ClientMessage::parse(r#"{"type":"transfer-done","peerId":"a9"}"#).unwrap();
        assert!(matches!(
            &msg,
            ClientMessage::TransferDone { peer_id } if peer_id.as_str() == "a9"
        ));
        assert!(msg.into_signal(&ClientId::new("o1")).is_none());
    }

    #[test]
    fn malformed_or_unknown_is_none() {
        assert!(ClientMessage::parse("{not json").is_none());
        assert!(ClientMessage::parse(r#"{"type":"hello"}"#).is_none());
        assert!(ClientMessage::parse(r#"{"type":"offer","to":"a1"}"#).is_none());
        assert!(ClientMessage::parse(r#"{"type":"offer","to":"a1","sid":"x","sdp":{}}"#).is_none());
    }
}
