//! Role assignment and slot filling. Pure functions over a registry.

use roomdrop_common::ClientId;

use super::registry::{ConnHandle, Registry};
use super::{AnswererState, Role, RoomConfig};

/// Role for a client about to join.
///
/// A designated offerer is the only client that can ever be offerer.
/// Otherwise the first client into a room without an offerer takes the
/// role. An existing connection of the same client is ignored since it is
/// about to be replaced.
pub fn assign_role(config: &RoomConfig, registry: &Registry, client_id: &ClientId) -> Role {
    if let Some(designated) = &config.designated_offerer {
        return if designated == client_id {
            Role::Offerer
        } else {
            Role::Answerer
        };
    }
    let has_offerer = registry
        .iter()
        .any(|c| c.is_offerer() && &c.client_id != client_id);
    if has_offerer {
        Role::Answerer
    } else {
        Role::Offerer
    }
}

/// Waiting answerers to promote now, oldest first.
///
/// Empty when there is no offerer or every slot is taken.
pub fn select_promotions(config: &RoomConfig, registry: &Registry) -> Vec<ConnHandle> {
    if registry.offerer().is_none() {
        return Vec::new();
    }
    let active = registry.count_in(AnswererState::Active);
    let available = (config.max_concurrent as usize).saturating_sub(active);
    if available == 0 {
        return Vec::new();
    }

    let mut waiting: Vec<_> = registry
        .iter()
        .filter(|c| c.role == Role::Answerer && c.is_waiting())
        .collect();
    waiting.sort_by_key(|c| c.joined_at);
    waiting.into_iter().take(available).map(|c| c.handle).collect()
}
