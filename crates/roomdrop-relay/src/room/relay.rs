//! Delivery of status and negotiation messages to room members.

use roomdrop_common::ClientId;
use tracing::debug;

use super::registry::{Connection, Registry};
use crate::protocol::ServerMessage;

/// Send `message` to every connection in the room.
pub fn broadcast(registry: &Registry, message: &ServerMessage) {
    for conn in registry.iter() {
        conn.link.send(message);
    }
}

/// Current member count to everyone.
pub fn broadcast_peers(registry: &Registry) {
    broadcast(
        registry,
        &ServerMessage::Peers {
            count: registry.len(),
        },
    );
}

/// Forward a negotiation message from `sender` to the connection of `to`.
///
/// Only the offerer and an active answerer may exchange messages, in either
/// direction. Anything else is dropped. Returns whether it was delivered.
pub fn route(registry: &Registry, sender: &Connection, to: &ClientId, message: &ServerMessage) -> bool {
    let Some(target) = registry.by_client(to) else {
        debug!(from = %sender.client_id, to = %to, "Dropping signal for unknown peer");
        return false;
    };
    let paired = (sender.is_offerer() && target.is_active())
        || (sender.is_active() && target.is_offerer());
    if !paired {
        debug!(from = %sender.client_id, to = %to, "Dropping signal between unpaired peers");
        return false;
    }
    target.link.send(message);
    true
}
