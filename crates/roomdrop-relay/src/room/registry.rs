//! Connections of one room, keyed by an opaque handle.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use roomdrop_common::ClientId;

use super::link::{CloseReason, Link};
use super::{AnswererState, Role};

/// Identifies one socket for its lifetime. Never reused within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnHandle(u64);

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct Connection {
    pub handle: ConnHandle,
    pub client_id: ClientId,
    pub role: Role,
    /// `None` for the offerer.
    pub state: Option<AnswererState>,
    /// Join order within the room. Strictly increasing.
    pub joined_at: u64,
    pub link: Link,
}

impl Connection {
    pub fn is_offerer(&self) -> bool {
        self.role == Role::Offerer
    }

    pub fn is_active(&self) -> bool {
        self.state == Some(AnswererState::Active)
    }

    pub fn is_waiting(&self) -> bool {
        self.state == Some(AnswererState::Waiting)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    conns: BTreeMap<ConnHandle, Connection>,
    by_client: HashMap<ClientId, ConnHandle>,
    next_handle: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection. If `client_id` already has one, that one is
    /// removed, told to close as replaced, and returned.
    pub fn join(&mut self, client_id: ClientId, role: Role, link: Link) -> (ConnHandle, Option<Connection>) {
        let replaced = self
            .by_client
            .get(&client_id)
            .copied()
            .and_then(|old| self.leave(old));
        if let Some(old) = &replaced {
            old.link.close(CloseReason::Replaced);
        }

        self.next_handle += 1;
        let handle = ConnHandle(self.next_handle);
        let state = match role {
            Role::Offerer => None,
            Role::Answerer => Some(AnswererState::Waiting),
        };
        self.by_client.insert(client_id.clone(), handle);
        self.conns.insert(
            handle,
            Connection {
                handle,
                client_id,
                role,
                state,
                joined_at: self.next_handle,
                link,
            },
        );
        (handle, replaced)
    }

    /// Remove a connection. Unknown handles (already replaced) return `None`.
    pub fn leave(&mut self, handle: ConnHandle) -> Option<Connection> {
        let conn = self.conns.remove(&handle)?;
        if self.by_client.get(&conn.client_id) == Some(&handle) {
            self.by_client.remove(&conn.client_id);
        }
        Some(conn)
    }

    pub fn get(&self, handle: ConnHandle) -> Option<&Connection> {
        self.conns.get(&handle)
    }

    pub fn by_client(&self, client_id: &ClientId) -> Option<&Connection> {
        self.by_client.get(client_id).and_then(|h| self.conns.get(h))
    }

    /// Connections in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.conns.values()
    }

    pub fn offerer(&self) -> Option<&Connection> {
        self.iter().find(|c| c.is_offerer())
    }

    pub fn state(&self, handle: ConnHandle) -> Option<AnswererState> {
        self.conns.get(&handle).and_then(|c| c.state)
    }

    /// Set an answerer's state. Returns false for offerers and unknown handles.
    pub fn set_state(&mut self, handle: ConnHandle, state: AnswererState) -> bool {
        match self.conns.get_mut(&handle) {
            Some(conn) if conn.role == Role::Answerer => {
                conn.state = Some(state);
                true
            }
            _ => false,
        }
    }

    pub fn count_in(&self, state: AnswererState) -> usize {
        self.iter().filter(|c| c.state == Some(state)).count()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link::new(8).0
    }

    #[test]
    fn join_assigns_increasing_order() {
        let mut reg = Registry::new();
        let (a, _) = reg.join(ClientId::new("a"), Role::Offerer, link());
        let (b, _) = reg.join(ClientId::new("b"), Role::Answerer, link());
        assert!(reg.get(a).unwrap().joined_at < reg.get(b).unwrap().joined_at);
        assert_eq!(reg.state(a), None);
        assert_eq!(reg.state(b), Some(AnswererState::Waiting));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn rejoin_replaces_and_closes_old() {
        let mut reg = Registry::new();
        let (old_link, _rx, old_close) = Link::new(8);
        let (old, _) = reg.join(ClientId::new("a"), Role::Answerer, old_link);

        let (new, replaced) = reg.join(ClientId::new("a"), Role::Answerer, link());
        let replaced = replaced.unwrap();
        assert_eq!(replaced.handle, old);
        assert_eq!(*old_close.borrow(), Some(CloseReason::Replaced));
        assert_ne!(old, new);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.by_client(&ClientId::new("a")).unwrap().handle, new);
    }

    #[test]
    fn leave_of_replaced_handle_is_noop() {
        let mut reg = Registry::new();
        let (old, _) = reg.join(ClientId::new("a"), Role::Answerer, link());
        let (new, _) = reg.join(ClientId::new("a"), Role::Answerer, link());
        assert!(reg.leave(old).is_none());
        assert!(reg.get(new).is_some());
        assert!(reg.by_client(&ClientId::new("a")).is_some());
    }

    #[test]
    fn set_state_only_applies_to_answerers() {
        let mut reg = Registry::new();
        let (o, _) = reg.join(ClientId::new("o"), Role::Offerer, link());
        let (a, _) = reg.join(ClientId::new("a"), Role::Answerer, link());
        assert!(!reg.set_state(o, AnswererState::Active));
        assert!(reg.set_state(a, AnswererState::Active));
        assert_eq!(reg.count_in(AnswererState::Active), 1);
        assert_eq!(reg.offerer().unwrap().handle, o);
    }
}
