use roomdrop_common::TransferError;

/// Everything that can end a `send` or `receive` run.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("signaling: {0}")]
    Signaling(String),

    /// The relay put us in the wrong seat for this command.
    #[error("{0}")]
    Rejected(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("peer connection: {0}")]
    Peer(#[from] webrtc::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
