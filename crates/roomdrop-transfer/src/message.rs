//! Control messages carried as text frames on the data channel.

use roomdrop_common::TransferError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Describes the file that follows. Sent once, before any binary frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMeta {
    pub name: String,
    /// Plaintext byte size of the whole file.
    pub size: u64,
    #[serde(rename = "mime")]
    pub mime_type: String,
    pub encrypted: bool,
}

impl TransferMeta {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MIME)
                .to_string(),
            encrypted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Meta(TransferMeta),
    Done,
}

impl ControlMessage {
    /// Parse a text frame. Anything that is not a known control message
    /// yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_json(&self) -> Result<String, TransferError> {
        serde_json::to_string(self).map_err(|e| TransferError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_wire_shape() {
        let mut meta = TransferMeta::new("report.pdf", 1234, Some("application/pdf"));
        meta.encrypted = true;
        let json: serde_json::Value =
            serde_json::from_str(&ControlMessage::Meta(meta).to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "meta");
        assert_eq!(json["name"], "report.pdf");
        assert_eq!(json["size"], 1234);
        assert_eq!(json["mime"], "application/pdf");
        assert_eq!(json["encrypted"], true);
    }

    #[test]
    fn done_wire_shape() {
        assert_eq!(ControlMessage::Done.to_json().unwrap(), r#"{"type":"done"}"#);
    }

    #[test]
    fn parses_browser_meta() {
        let msg = ControlMessage::parse(
            r#"{"type":"meta","name":"a.txt","size":3,"mime":"text/plain","encrypted":false}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::Meta(meta) => {
                assert_eq!(meta.name, "a.txt");
                assert_eq!(meta.mime_type, "text/plain");
                assert!(!meta.encrypted);
            }
            ControlMessage::Done => panic!("expected meta"),
        }
    }

    #[test]
    fn unknown_or_malformed_text_is_none() {
        assert!(ControlMessage::parse("not json").is_none());
        assert!(ControlMessage::parse(r#"{"type":"progress","n":1}"#).is_none());
        assert!(ControlMessage::parse(r#"{"type":"meta","name":"x"}"#).is_none());
    }

    #[test]
    fn empty_mime_falls_back_to_octet_stream() {
        assert_eq!(TransferMeta::new("x", 0, Some("")).mime_type, DEFAULT_MIME);
        assert_eq!(TransferMeta::new("x", 0, None).mime_type, DEFAULT_MIME);
    }
}
