//! Live rooms: maps room ids to their actors and reaps the idle ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use roomdrop_common::RoomId;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::room::{actor, Room, RoomConfig, RoomHandle};
use crate::store::RoomConfigStore;

/// Occupancy of one room, shared with the sockets inside it.
struct Occupancy {
    members: AtomicUsize,
    /// Milliseconds since the manager epoch when the room last emptied.
    vacated_at: AtomicU64,
}

struct LiveRoom {
    handle: RoomHandle,
    occupancy: Arc<Occupancy>,
}

/// Held by a socket for as long as it is inside a room.
pub struct Membership {
    occupancy: Arc<Occupancy>,
    epoch: Instant,
}

impl Drop for Membership {
    fn drop(&mut self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.occupancy.vacated_at.store(now, Ordering::Release);
        self.occupancy.members.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Thread-safe registry of live rooms.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<RoomId, LiveRoom>>>,
    store: RoomConfigStore,
    default_max_concurrent: u32,
    epoch: Instant,
}

impl RoomManager {
    pub fn new(store: RoomConfigStore, default_max_concurrent: u32) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            store,
            default_max_concurrent,
            epoch: Instant::now(),
        }
    }

    pub fn store(&self) -> &RoomConfigStore {
        &self.store
    }

    /// Enter `room_id`, starting its actor if needed. Rooms nobody created
    /// run with default settings.
    pub async fn enter(&self, room_id: &RoomId) -> (RoomHandle, Membership) {
        let config = match self.store.get(room_id).await {
            Some(config) => config,
            None => RoomConfig::new(self.default_max_concurrent),
        };

        let mut rooms = self.rooms.write().await;
        let live = rooms.entry(room_id.clone()).or_insert_with(|| {
            info!(room = %room_id, max_concurrent = config.max_concurrent, "Starting room");
            LiveRoom {
                handle: actor::spawn(Room::new(room_id.clone(), config)),
                occupancy: Arc::new(Occupancy {
                    members: AtomicUsize::new(0),
                    vacated_at: AtomicU64::new(0),
                }),
            }
        });
        // Counted under the map lock so the reaper never sees a room that is
        // about to be joined as empty.
        live.occupancy.members.fetch_add(1, Ordering::AcqRel);
        (
            live.handle.clone(),
            Membership {
                occupancy: Arc::clone(&live.occupancy),
                epoch: self.epoch,
            },
        )
    }

    /// Drop rooms that have been empty for longer than `idle_ttl`. Returns
    /// how many were removed.
    pub async fn reap_idle(&self, idle_ttl: Duration) -> usize {
        let mut rooms = self.rooms.write().await;
        let now = self.epoch.elapsed().as_millis() as u64;
        let ttl = idle_ttl.as_millis() as u64;
        let before = rooms.len();
        rooms.retain(|id, live| {
            let empty = live.occupancy.members.load(Ordering::Acquire) == 0;
            let idle_for = now.saturating_sub(live.occupancy.vacated_at.load(Ordering::Acquire));
            let stale = empty && idle_for >= ttl;
            if stale {
                info!(room = %id, "Reaping idle room");
            }
            !stale
        });
        before - rooms.len()
    }

    /// Number of live rooms.
    pub async fn count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Run [`reap_idle`](Self::reap_idle) every `interval` until the task is
    /// aborted.
    pub async fn run_reaper(self, interval: Duration, idle_ttl: Duration) {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            let reaped = self.reap_idle(idle_ttl).await;
            let rooms = self.count().await;
            debug!(reaped, rooms, "Reaper tick");
        }
    }
}
