//! Room coordination: who is connected, who may talk to whom, and who is
//! next in line.
//!
//! Each room is owned by a single actor task ([`actor`]) that applies join,
//! message and leave events one at a time to a [`Room`].

pub mod actor;
pub mod coordinator;
pub mod link;
pub mod policy;
pub mod registry;
pub mod relay;


use roomdrop_common::ClientId;
use serde::{Deserialize, Serialize};

pub use actor::RoomHandle;
pub use coordinator::Room;
pub use link::{CloseReason, Link};

/// Role a connection holds for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Offerer,
    Answerer,
}

/// Answerer lifecycle. Offerers carry no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswererState {
    /// Queued for a slot.
    Waiting,
    /// Paired with the offerer.
    Active,
    /// Transfer finished. Never promoted again.
    Done,
}

/// Per-room settings fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    /// Upper bound on simultaneously active answerers. At least 1.
    pub max_concurrent: u32,
    /// When set, only this client may become the offerer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designated_offerer: Option<ClientId>,
}

impl RoomConfig {
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            designated_offerer: None,
        }
    }

    pub fn with_designated_offerer(mut self, client_id: ClientId) -> Self {
        self.designated_offerer = Some(client_id);
        self
    }
}
