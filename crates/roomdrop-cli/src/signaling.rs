//! Client half of the relay's WebSocket protocol.

use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use roomdrop_common::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Offerer,
    Answerer,
}

/// What the relay tells us.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Incoming {
    #[serde(rename = "role")]
    Role { role: Role, cid: ClientId },

    #[serde(rename = "peers")]
    Peers { count: usize },

    #[serde(rename = "wait")]
    Wait,

    #[serde(rename = "start")]
    Start {
        #[serde(rename = "peerId", default)]
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

/// What we tell the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Outgoing {
    #[serde(rename = "offer")]
    Offer { to: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "answer")]
    Answer { to: ClientId, sid: u64, sdp: Value },

    #[serde(rename = "transfer-done")]
    TransferDone {
        #[serde(rename = "peerId")]
        peer_id: ClientId,
    },
}

/// An open signaling socket. Writes go through a background task so
/// callers never wait on the network to queue a message.
pub struct Signaling {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    incoming: SplitStream<WsStream>,
    writer: JoinHandle<Result<(), ClientError>>,
}

impl Signaling {
    pub async fn connect(url: &Url) -> Result<Self, ClientError> {
        debug!(%url, "Connecting to relay");
        let (ws, _) = connect_async(url.as_str()).await?;
        let (mut sink, incoming) = ws.split();
        let (outgoing, mut queue) = mpsc::unbounded_channel::<Outgoing>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                let text = serde_json::to_string(&msg)?;
                sink.send(Message::Text(text.into())).await?;
            }
            let _ = sink.send(Message::Close(None)).await;
            Ok::<(), ClientError>(())
        });

        Ok(Self {
            outgoing,
            incoming,
            writer,
        })
    }

    pub fn send(&self, msg: Outgoing) -> Result<(), ClientError> {
        self.outgoing
            .send(msg)
            .map_err(|_| ClientError::Signaling("writer stopped".into()))
    }

    /// Next message from the relay, or `None` once the socket closes.
    /// Unknown messages are skipped. Cancel-safe.
    pub async fn next(&mut self) -> Result<Option<Incoming>, ClientError> {
        while let Some(frame) = self.incoming.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str(text.as_str()) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => debug!(error = %e, "Skipping unrecognized relay message"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "Relay closed the socket");
                    return Ok(None);
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// Flush queued messages and close the socket.
    pub async fn close(self) {
        let Signaling {
            outgoing,
            incoming,
            writer,
        } = self;
        drop(outgoing);
        match tokio::time::timeout(CLOSE_TIMEOUT, writer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Signaling writer failed"),
            Ok(Err(e)) => warn!(error = %e, "Signaling writer panicked"),
            Err(_) => warn!("Signaling writer did not flush in time"),
        }
        drop(incoming);
    }
}
