//! `roomdrop send`: hold the offerer seat and push one file to every
//! answerer the relay pairs us with.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use roomdrop_common::{ClientId, RoomId, TransferError};
use roomdrop_transfer::{send_file, FrameCipher, RoomKey, SendReport, TransferOptions};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::peer::{self, PeerSettings, PendingCandidates, RtcChannel};
use crate::signaling::{Incoming, Outgoing, Role, Signaling};

const DATA_CHANNEL_LABEL: &str = "file";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const LINGER: Duration = Duration::from_secs(5);

pub struct SendJob {
    pub room_id: RoomId,
    pub client_id: ClientId,
    pub file: PathBuf,
    pub key: Option<RoomKey>,
    /// Stop after this many completed transfers. `None` serves until the
    /// relay goes away.
    pub limit: Option<usize>,
    pub peer: PeerSettings,
    pub options: TransferOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub completed: usize,
}

enum PeerEvent {
    Finished {
        peer_id: ClientId,
        sid: u64,
        result: Result<SendReport, TransferError>,
    },
    /// The data channel closed, normally because the receiver hung up.
    Closed { peer_id: ClientId, sid: u64 },
}

struct OfferPeer {
    pc: Arc<RTCPeerConnection>,
    sid: u64,
    candidates: PendingCandidates,
    /// The whole file went out. Kept open until the receiver hangs up so
    /// the tail of the transfer is not cut off.
    delivered: bool,
}

struct OfferSession {
    job: SendJob,
    cipher: Option<Arc<FrameCipher>>,
    peers: HashMap<ClientId, OfferPeer>,
    next_sid: u64,
    completed: usize,
    events: mpsc::UnboundedSender<PeerEvent>,
}

pub async fn run(endpoint: &Endpoint, job: SendJob) -> Result<SendSummary, ClientError> {
    let metadata = tokio::fs::metadata(&job.file).await?;
    if !metadata.is_file() {
        return Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a file", job.file.display()),
        )));
    }

    let mut signaling =
        Signaling::connect(&endpoint.signaling_url(&job.room_id, &job.client_id)).await?;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut session = OfferSession {
        cipher: job.key.as_ref().map(|key| Arc::new(FrameCipher::new(key))),
        job,
        peers: HashMap::new(),
        next_sid: 0,
        completed: 0,
        events: events_tx,
    };

    let result = loop {
        tokio::select! {
            msg = signaling.next() => match msg {
                Ok(Some(msg)) => {
                    if let Err(e) = session.on_signal(&signaling, msg).await {
                        break Err(e);
                    }
                }
                Ok(None) => break Err(ClientError::Signaling("relay closed the connection".into())),
                Err(e) => break Err(e),
            },
            Some(event) = events.recv() => match session.on_peer_event(&signaling, event).await {
                Ok(true) => break Ok(SendSummary { completed: session.completed }),
                Ok(false) => {}
                Err(e) => break Err(e),
            },
        }
    };

    if result.is_ok() {
        session.linger(&mut events).await;
    }
    for (_, peer) in session.peers.drain() {
        let _ = peer.pc.close().await;
    }
    signaling.close().await;
    result
}

impl OfferSession {
    async fn on_signal(&mut self, signaling: &Signaling, msg: Incoming) -> Result<(), ClientError> {
        match msg {
            Incoming::Role { role, cid } => {
                if role != Role::Offerer {
                    return Err(ClientError::Rejected(
                        "another client is already sending in this room".into(),
                    ));
                }
                info!(room = %self.job.room_id, cid = %cid, "Holding the sender seat");
            }
            Incoming::Peers { count } => info!(count, "Peers in room"),
            Incoming::Start {
                peer_id: Some(peer_id),
            } => self.open_peer(signaling, peer_id).await?,
            Incoming::Answer { from, sid, sdp } => match self.peers.get_mut(&from) {
                Some(peer) if peer.sid == sid => peer.candidates.set_remote(&peer.pc, sdp).await?,
                _ => debug!(peer = %from, sid, "Ignoring stale answer"),
            },
            Incoming::Candidate {
                from,
                sid,
                candidate,
            } => match self.peers.get_mut(&from) {
                Some(peer) if peer.sid == sid => peer.candidates.add(&peer.pc, candidate).await?,
                _ => debug!(peer = %from, sid, "Ignoring stale candidate"),
            },
            Incoming::PeerLeft { peer_id } => {
                info!(peer = %peer_id, "Receiver left");
                self.drop_peer(&peer_id, None).await;
            }
            other => debug!(?other, "Ignoring message"),
        }
        Ok(())
    }

    async fn open_peer(&mut self, signaling: &Signaling, peer_id: ClientId) -> Result<(), ClientError> {
        self.drop_peer(&peer_id, None).await;
        self.next_sid += 1;
        let sid = self.next_sid;

        let pc = peer::new_peer_connection(&self.job.peer).await?;
        let dc = pc
            .create_data_channel(
                DATA_CHANNEL_LABEL,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await?;
        self.send_when_open(&dc, peer_id.clone(), sid);

        let offer = pc.create_offer(None).await?;
        let sdp = peer::set_local_and_gather(&pc, offer, self.job.peer.gather_timeout).await?;
        signaling.send(Outgoing::Offer {
            to: peer_id.clone(),
            sid,
            sdp,
        })?;
        info!(peer = %peer_id, sid, "Offer sent");

        self.peers.insert(
            peer_id,
            OfferPeer {
                pc,
                sid,
                candidates: PendingCandidates::default(),
                delivered: false,
            },
        );
        Ok(())
    }

    fn send_when_open(&self, dc: &Arc<RTCDataChannel>, peer_id: ClientId, sid: u64) {
        let dc_ref = Arc::clone(dc);
        let file = self.job.file.clone();
        let cipher = self.cipher.clone();
        let options = self.job.options;
        let events = self.events.clone();
        let (closed_peer, closed_events) = (peer_id.clone(), self.events.clone());

        dc.on_open(Box::new(move || {
            let channel = RtcChannel::new(Arc::clone(&dc_ref));
            let (file, cipher, events, peer_id) =
                (file.clone(), cipher.clone(), events.clone(), peer_id.clone());
            Box::pin(async move {
                tokio::spawn(async move {
                    let result = send_file(&channel, &file, None, cipher.as_deref(), &options).await;
                    if result.is_ok() && !channel.drain(DRAIN_TIMEOUT).await {
                        warn!(peer = %peer_id, "Data channel did not drain before timeout");
                    }
                    let _ = events.send(PeerEvent::Finished {
                        peer_id,
                        sid,
                        result,
                    });
                });
            })
        }));
        dc.on_close(Box::new(move || {
            let _ = closed_events.send(PeerEvent::Closed {
                peer_id: closed_peer.clone(),
                sid,
            });
            Box::pin(async {})
        }));
    }

    /// Returns `true` once the transfer limit is reached.
    async fn on_peer_event(&mut self, signaling: &Signaling, event: PeerEvent) -> Result<bool, ClientError> {
        let (peer_id, sid, result) = match event {
            PeerEvent::Closed { peer_id, sid } => {
                debug!(peer = %peer_id, sid, "Data channel closed");
                self.drop_peer(&peer_id, Some(sid)).await;
                return Ok(false);
            }
            PeerEvent::Finished {
                peer_id,
                sid,
                result,
            } => (peer_id, sid, result),
        };

        match result {
            Ok(report) => {
                signaling.send(Outgoing::TransferDone {
                    peer_id: peer_id.clone(),
                })?;
                if let Some(peer) = self.peers.get_mut(&peer_id).filter(|peer| peer.sid == sid) {
                    peer.delivered = true;
                }
                self.completed += 1;
                info!(
                    peer = %peer_id,
                    bytes = report.bytes,
                    frames = report.frames,
                    stalls = report.stalls,
                    completed = self.completed,
                    "Transfer complete"
                );
            }
            Err(e) => {
                warn!(peer = %peer_id, error = %e, "Transfer failed");
                self.drop_peer(&peer_id, Some(sid)).await;
            }
        }
        Ok(self.job.limit.is_some_and(|limit| self.completed >= limit))
    }

    /// Close and forget `peer_id`. With a `sid`, only if it still names
    /// that connection.
    async fn drop_peer(&mut self, peer_id: &ClientId, sid: Option<u64>) {
        let current = self
            .peers
            .get(peer_id)
            .is_some_and(|peer| sid.map_or(true, |sid| peer.sid == sid));
        if !current {
            return;
        }
        if let Some(peer) = self.peers.remove(peer_id) {
            let _ = peer.pc.close().await;
        }
    }

    /// Wait, up to a short deadline, for receivers that got the whole file
    /// to hang up.
    async fn linger(&mut self, events: &mut mpsc::UnboundedReceiver<PeerEvent>) {
        let deadline = tokio::time::Instant::now() + LINGER;
        while self.peers.values().any(|peer| peer.delivered) {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(PeerEvent::Closed { peer_id, sid })) => {
                    self.drop_peer(&peer_id, Some(sid)).await;
                }
                Ok(Some(PeerEvent::Finished { .. })) => {}
                Ok(None) | Err(_) => break,
            }
        }
    }
}
