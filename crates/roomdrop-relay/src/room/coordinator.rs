//! Room state machine. Every method runs to completion on the room actor,
//! so no two events ever interleave.

use roomdrop_common::{ClientId, RoomId};
use tracing::{debug, info};

use super::link::Link;
use super::registry::{ConnHandle, Connection, Registry};
use super::{policy, relay, AnswererState, Role, RoomConfig};
use crate::protocol::{ClientMessage, ServerMessage};

pub struct Room {
    id: RoomId,
    config: RoomConfig,
    registry: Registry,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            config,
            registry: Registry::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Admit a socket for `client_id`.
    ///
    /// A previous socket of the same client is closed and its departure
    /// fully applied before the new one is admitted. The newcomer gets its
    /// role (and `wait` if answerer), everyone gets the new member count,
    /// then free slots are filled.
    pub fn join(&mut self, client_id: ClientId, link: Link) -> ConnHandle {
        let role = policy::assign_role(&self.config, &self.registry, &client_id);
        let (handle, replaced) = self.registry.join(client_id.clone(), role, link);
        if let Some(old) = replaced {
            info!(room = %self.id, client = %client_id, old = %old.handle, "Connection replaced");
            self.depart(old);
        }

        info!(room = %self.id, client = %client_id, conn = %handle, role = ?role, "Joined");
        if let Some(conn) = self.registry.get(handle) {
            conn.link.send(&ServerMessage::Role {
                role,
                cid: client_id,
            });
            if role == Role::Answerer {
                conn.link.send(&ServerMessage::Wait);
            }
        }
        relay::broadcast_peers(&self.registry);
        self.fill_slots();
        handle
    }

    /// Handle a text frame from `handle`. Malformed and unauthorized
    /// messages are dropped.
    pub fn message(&mut self, handle: ConnHandle, text: &str) {
        let Some(sender) = self.registry.get(handle) else {
            return;
        };
        let Some(message) = ClientMessage::parse(text) else {
            debug!(room = %self.id, conn = %handle, "Dropping malformed message");
            return;
        };

        match message {
            ClientMessage::TransferDone { peer_id } => self.transfer_done(handle, &peer_id),
            signal => {
                if let Some((to, forward)) = signal.into_signal(&sender.client_id) {
                    relay::route(&self.registry, sender, &to, &forward);
                }
            }
        }
    }

    /// Remove `handle` after its socket closed. Replaced handles are already
    /// gone and are ignored.
    pub fn leave(&mut self, handle: ConnHandle) {
        let Some(conn) = self.registry.leave(handle) else {
            return;
        };
        info!(room = %self.id, client = %conn.client_id, conn = %handle, "Left");
        self.depart(conn);
        if self.registry.is_empty() {
            debug!(room = %self.id, "Room empty");
            return;
        }
        relay::broadcast_peers(&self.registry);
        self.fill_slots();
    }

    /// Consequences of a connection leaving, without refilling slots.
    fn depart(&mut self, conn: Connection) {
        match (conn.role, conn.state) {
            (Role::Offerer, _) => {
                let answerers: Vec<_> = self
                    .registry
                    .iter()
                    .filter(|c| c.role == Role::Answerer)
                    .map(|c| c.handle)
                    .collect();
                for handle in answerers {
                    self.registry.set_state(handle, AnswererState::Waiting);
                    if let Some(c) = self.registry.get(handle) {
                        c.link.send(&ServerMessage::Wait);
                    }
                }
                info!(room = %self.id, "Offerer left, answerers back to waiting");
            }
            (Role::Answerer, Some(AnswererState::Active)) => {
                if let Some(offerer) = self.registry.offerer() {
                    offerer.link.send(&ServerMessage::PeerLeft {
                        peer_id: conn.client_id,
                    });
                }
            }
            (Role::Answerer, _) => {}
        }
    }

    fn transfer_done(&mut self, sender: ConnHandle, peer_id: &ClientId) {
        let from_offerer = self.registry.get(sender).is_some_and(|c| c.is_offerer());
        if !from_offerer {
            debug!(room = %self.id, conn = %sender, "Ignoring transfer-done from non-offerer");
            return;
        }
        let handle = match self.registry.by_client(peer_id) {
            Some(target) if self.registry.state(target.handle) == Some(AnswererState::Active) => target.handle,
            _ => {
                debug!(room = %self.id, peer = %peer_id, "Ignoring transfer-done for inactive peer");
                return;
            }
        };
        self.registry.set_state(handle, AnswererState::Done);
        info!(room = %self.id, peer = %peer_id, "Transfer done");
        self.fill_slots();
    }

    /// Promote waiting answerers into free slots, oldest first. Each
    /// promotion sends `start` to the answerer and `start{peerId}` to the
    /// offerer.
    fn fill_slots(&mut self) {
        let promotions = policy::select_promotions(&self.config, &self.registry);
        for handle in promotions {
            self.registry.set_state(handle, AnswererState::Active);
            let (Some(answerer), Some(offerer)) = (self.registry.get(handle), self.registry.offerer()) else {
                continue;
            };
            answerer.link.send(&ServerMessage::Start { peer_id: None });
            offerer.link.send(&ServerMessage::Start {
                peer_id: Some(answerer.client_id.clone()),
            });
            debug!(room = %self.id, peer = %answerer.client_id, "Promoted");
        }
    }
}
