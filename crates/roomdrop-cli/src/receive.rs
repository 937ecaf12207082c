//! `roomdrop receive`: queue as an answerer, accept the sender's offer, and
//! save the first file that completes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use roomdrop_common::{ClientId, RoomId};
use roomdrop_transfer::{CompletedFile, FrameCipher, ReceiverEvent, RoomKey, TransferReceiver};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::peer::{self, ChannelEvent, PeerSettings, PendingCandidates};
use crate::signaling::{Incoming, Outgoing, Role, Signaling};

const FALLBACK_NAME: &str = "download";

pub struct ReceiveJob {
    pub room_id: RoomId,
    pub client_id: ClientId,
    pub output_dir: PathBuf,
    pub key: Option<RoomKey>,
    pub peer: PeerSettings,
}

struct AnswerPeer {
    pc: Arc<RTCPeerConnection>,
    sid: u64,
    candidates: PendingCandidates,
}

struct AnswerSession {
    job: ReceiveJob,
    receiver: TransferReceiver,
    active: Option<AnswerPeer>,
    events: mpsc::UnboundedSender<(u64, ChannelEvent)>,
}

/// Receive one file into `job.output_dir`. Returns where it was saved.
pub async fn run(endpoint: &Endpoint, job: ReceiveJob) -> Result<PathBuf, ClientError> {
    let mut signaling =
        Signaling::connect(&endpoint.signaling_url(&job.room_id, &job.client_id)).await?;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut session = AnswerSession {
        receiver: TransferReceiver::new(job.key.as_ref().map(FrameCipher::new)),
        job,
        active: None,
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
            Some((sid, event)) = events.recv() => match session.on_channel(sid, event) {
                Ok(Some(file)) => break save(&session.job.output_dir, &file).await,
                Ok(None) => {}
                Err(e) => break Err(e),
            },
        }
    };

    if let Some(peer) = session.active.take() {
        let _ = peer.pc.close().await;
    }
    signaling.close().await;
    result
}

impl AnswerSession {
    async fn on_signal(&mut self, signaling: &Signaling, msg: Incoming) -> Result<(), ClientError> {
        match msg {
            Incoming::Role { role, cid } => {
                if role != Role::Answerer {
                    return Err(ClientError::Rejected(
                        "no sender in this room yet; start the sender first".into(),
                    ));
                }
                info!(room = %self.job.room_id, cid = %cid, "Joined as receiver");
            }
            Incoming::Peers { count } => debug!(count, "Peers in room"),
            Incoming::Wait => {
                if let Some(peer) = self.active.take() {
                    let _ = peer.pc.close().await;
                }
                info!("Waiting for a free slot");
            }
            Incoming::Start { .. } => info!("Admitted, waiting for the sender's offer"),
            Incoming::Offer { from, sid, sdp } => self.accept_offer(signaling, from, sid, sdp).await?,
            Incoming::Candidate { sid, candidate, .. } => match self.active.as_mut() {
                Some(peer) if peer.sid == sid => peer.candidates.add(&peer.pc, candidate).await?,
                _ => debug!(sid, "Ignoring stale candidate"),
            },
            other => debug!(?other, "Ignoring message"),
        }
        Ok(())
    }

    async fn accept_offer(
        &mut self,
        signaling: &Signaling,
        from: ClientId,
        sid: u64,
        sdp: serde_json::Value,
    ) -> Result<(), ClientError> {
        if let Some(old) = self.active.take() {
            let _ = old.pc.close().await;
        }
        if let Err(e) = self.receiver.close() {
            warn!(error = %e, "Dropping partial transfer from the previous connection");
        }

        let pc = peer::new_peer_connection(&self.job.peer).await?;
        let events = self.events.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            debug!(label = dc.label(), sid, "Data channel opened by sender");
            peer::forward_frames(&dc, sid, events.clone());
            Box::pin(async {})
        }));

        let mut candidates = PendingCandidates::default();
        candidates.set_remote(&pc, sdp).await?;
        let answer = pc.create_answer(None).await?;
        let sdp = peer::set_local_and_gather(&pc, answer, self.job.peer.gather_timeout).await?;
        signaling.send(Outgoing::Answer {
            to: from.clone(),
            sid,
            sdp,
        })?;
        info!(peer = %from, sid, "Answer sent");

        self.active = Some(AnswerPeer { pc, sid, candidates });
        Ok(())
    }

    /// Feed one data channel event to the receiver. Returns the file once a
    /// unit completes.
    fn on_channel(&mut self, sid: u64, event: ChannelEvent) -> Result<Option<CompletedFile>, ClientError> {
        if self.active.as_ref().map(|peer| peer.sid) != Some(sid) {
            debug!(sid, "Ignoring event from a superseded connection");
            return Ok(None);
        }
        let frame = match event {
            ChannelEvent::Frame(frame) => frame,
            ChannelEvent::Closed => {
                if let Err(e) = self.receiver.close() {
                    warn!(error = %e, "Sender went away mid-transfer");
                }
                return Ok(None);
            }
        };
        match self.receiver.handle_frame(frame)? {
            ReceiverEvent::Started(meta) => {
                info!(
                    name = %meta.name,
                    size = meta.size,
                    mime = %meta.mime_type,
                    encrypted = meta.encrypted,
                    "Receiving"
                );
                Ok(None)
            }
            ReceiverEvent::Progress { received, expected } => {
                debug!(received, expected, "Progress");
                Ok(None)
            }
            ReceiverEvent::Completed(file) => Ok(Some(file)),
            ReceiverEvent::Ignored => Ok(None),
        }
    }
}

/// Write `file` under `dir`, never outside it and never over an existing
/// file.
async fn save(dir: &Path, file: &CompletedFile) -> Result<PathBuf, ClientError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = unique_path(dir, &file.meta.name);
    tokio::fs::write(&path, &file.data).await?;
    info!(path = %path.display(), bytes = file.data.len(), "Saved");
    Ok(path)
}

/// `dir/name`, or `dir/stem (n).ext` if taken. Any directory part of the
/// sender's name is dropped.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_NAME);
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
