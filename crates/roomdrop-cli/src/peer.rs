//! WebRTC glue: peer connections, description exchange, and the data
//! channel a transfer runs over.
//!
//! Local descriptions are sent only after ICE gathering completes, so they
//! carry every local candidate and this side never trickles. Candidates
//! trickled by a browser peer are applied as they arrive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use roomdrop_common::TransferError;
use roomdrop_transfer::{DataChannel, Frame};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::ClientError;

pub const DEFAULT_ICE_SERVER: &str = "stun:stun.cloudflare.com:3478";

const BUFFER_POLL: Duration = Duration::from_millis(10);

/// How peer connections are built.
#[derive(Debug, Clone)]
pub struct PeerSettings {
    /// STUN/TURN URLs. Empty means host candidates only.
    pub ice_servers: Vec<String>,
    /// Also gather loopback candidates, for two peers on one machine.
    pub include_loopback: bool,
    pub gather_timeout: Duration,
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_ICE_SERVER.to_string()],
            include_loopback: false,
            gather_timeout: Duration::from_secs(10),
        }
    }
}

pub async fn new_peer_connection(
    settings: &PeerSettings,
) -> Result<Arc<RTCPeerConnection>, ClientError> {
    let mut media = MediaEngine::default();
    let registry = register_default_interceptors(Registry::new(), &mut media)?;
    let mut setting = SettingEngine::default();
    setting.set_include_loopback_candidate(settings.include_loopback);

    let api = APIBuilder::new()
        .with_setting_engine(setting)
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = if settings.ice_servers.is_empty() {
        Vec::new()
    } else {
        vec![RTCIceServer {
            urls: settings.ice_servers.clone(),
            ..Default::default()
        }]
    };
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration {
            ice_servers,
            ..Default::default()
        })
        .await?,
    );

    pc.on_peer_connection_state_change(Box::new(|state: RTCPeerConnectionState| {
        Box::pin(async move {
            match state {
                RTCPeerConnectionState::Connected => info!("Peer connected"),
                RTCPeerConnectionState::Failed => warn!("Peer connection failed"),
                other => debug!(state = %other, "Peer connection state"),
            }
        })
    }));
    Ok(pc)
}

/// Apply `desc` locally and wait for ICE gathering. Returns the complete
/// description as the JSON the relay forwards.
pub async fn set_local_and_gather(
    pc: &RTCPeerConnection,
    desc: RTCSessionDescription,
    timeout: Duration,
) -> Result<Value, ClientError> {
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(desc).await?;
    tokio::time::timeout(timeout, gathered.recv())
        .await
        .map_err(|_| ClientError::Timeout("ICE gathering"))?;
    let local = pc
        .local_description()
        .await
        .ok_or_else(|| ClientError::Signaling("no local description after gathering".into()))?;
    Ok(serde_json::to_value(local)?)
}

pub fn parse_description(sdp: Value) -> Result<RTCSessionDescription, ClientError> {
    Ok(serde_json::from_value(sdp)?)
}

/// Remote candidates that arrived before the remote description.
#[derive(Default)]
pub struct PendingCandidates {
    remote_set: bool,
    queued: Vec<RTCIceCandidateInit>,
}

impl PendingCandidates {
    pub async fn add(&mut self, pc: &RTCPeerConnection, candidate: Value) -> Result<(), ClientError> {
        let candidate: RTCIceCandidateInit = serde_json::from_value(candidate)?;
        if self.remote_set {
            pc.add_ice_candidate(candidate).await?;
        } else {
            self.queued.push(candidate);
        }
        Ok(())
    }

    /// Set the remote description, then apply everything queued before it.
    pub async fn set_remote(&mut self, pc: &RTCPeerConnection, sdp: Value) -> Result<(), ClientError> {
        pc.set_remote_description(parse_description(sdp)?).await?;
        self.remote_set = true;
        for candidate in self.queued.drain(..) {
            pc.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }
}

/// What a data channel delivers to the receiving side.
#[derive(Debug)]
pub enum ChannelEvent {
    Frame(Frame),
    Closed,
}

/// Forward everything `dc` receives to `tx`, tagged with `sid` so events
/// from a superseded connection can be told apart.
pub fn forward_frames(dc: &Arc<RTCDataChannel>, sid: u64, tx: mpsc::UnboundedSender<(u64, ChannelEvent)>) {
    let on_close = tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let frame = if msg.is_string {
            Frame::Text(String::from_utf8_lossy(&msg.data).into_owned())
        } else {
            Frame::Binary(msg.data.to_vec())
        };
        let _ = tx.send((sid, ChannelEvent::Frame(frame)));
        Box::pin(async {})
    }));
    dc.on_close(Box::new(move || {
        let _ = on_close.send((sid, ChannelEvent::Closed));
        Box::pin(async {})
    }));
}

/// [`DataChannel`] over an open WebRTC data channel.
pub struct RtcChannel {
    dc: Arc<RTCDataChannel>,
    /// Last buffered amount read from the channel.
    buffered: AtomicUsize,
}

impl RtcChannel {
    pub fn new(dc: Arc<RTCDataChannel>) -> Self {
        Self {
            dc,
            buffered: AtomicUsize::new(0),
        }
    }

    fn ensure_open(&self) -> Result<(), TransferError> {
        if self.dc.ready_state() == RTCDataChannelState::Open {
            Ok(())
        } else {
            Err(TransferError::ChannelClosed)
        }
    }

    async fn refresh(&self) -> usize {
        let amount = self.dc.buffered_amount().await;
        self.buffered.store(amount, Ordering::Release);
        amount
    }

    /// Wait until everything sent has left the local buffer, or `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.buffered_amount_low(0))
            .await
            .is_ok()
    }
}

#[async_trait]
impl DataChannel for RtcChannel {
    async fn send_text(&self, text: String) -> Result<(), TransferError> {
        self.ensure_open()?;
        self.dc
            .send_text(text)
            .await
            .map_err(|_| TransferError::ChannelClosed)?;
        self.refresh().await;
        Ok(())
    }

    async fn send_binary(&self, data: Vec<u8>) -> Result<(), TransferError> {
        self.ensure_open()?;
        self.dc
            .send(&Bytes::from(data))
            .await
            .map_err(|_| TransferError::ChannelClosed)?;
        self.refresh().await;
        Ok(())
    }

    fn buffered_amount(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    async fn buffered_amount_low(&self, threshold: usize) {
        while self.dc.ready_state() == RTCDataChannelState::Open
            && self.refresh().await > threshold
        {
            tokio::time::sleep(BUFFER_POLL).await;
        }
    }
}
