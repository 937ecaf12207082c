//! Room configurations, kept in memory and optionally mirrored to a JSON
//! file so rooms survive a restart.
//!
//! Writes go to `<file>.tmp` first and are renamed over the target, so a
//! crash mid-write leaves the previous file intact.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roomdrop_common::{RoomId, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::room::RoomConfig;

const STORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    rooms: HashMap<RoomId, StoredRoom>,
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredRoom {
    #[serde(flatten)]
    config: RoomConfig,
    /// Creation order. The lowest sequence is evicted first.
    #[serde(default)]
    seq: u64,
}

#[derive(Default)]
struct Rooms {
    by_id: HashMap<RoomId, StoredRoom>,
    order: BTreeMap<u64, RoomId>,
    next_seq: u64,
}

impl Rooms {
    fn from_file(rooms: HashMap<RoomId, StoredRoom>) -> Self {
        let mut loaded = Self::default();
        let mut entries: Vec<_> = rooms.into_iter().collect();
        entries.sort_by_key(|(id, room)| (room.seq, id.as_str().to_owned()));
        for (id, mut room) in entries {
            room.config.max_concurrent = room.config.max_concurrent.max(1);
            loaded.push(id, room.config);
        }
        loaded
    }

    fn push(&mut self, id: RoomId, config: RoomConfig) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id.clone());
        self.by_id.insert(id, StoredRoom { config, seq });
    }

    fn remove(&mut self, id: &RoomId) {
        if let Some(room) = self.by_id.remove(id) {
            self.order.remove(&room.seq);
        }
    }

    /// Drop the oldest rooms until at most `max` remain.
    fn evict_to(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.by_id.len() > max {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            self.by_id.remove(&id);
            evicted += 1;
        }
        evicted
    }

    fn snapshot(&self) -> StoreFile {
        StoreFile {
            version: STORE_VERSION,
            rooms: self.by_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RoomConfigStore {
    rooms: Arc<RwLock<Rooms>>,
    /// Serializes file writes. Never held together with a write lock on
    /// `rooms`, so lookups proceed while the disk is busy.
    writer: Arc<Mutex<()>>,
    path: Option<Arc<PathBuf>>,
    max_rooms: usize,
}

impl RoomConfigStore {
    /// A store that forgets everything on restart.
    pub fn in_memory(max_rooms: usize) -> Self {
        Self::with_rooms(Rooms::default(), None, max_rooms)
    }

    fn with_rooms(rooms: Rooms, path: Option<PathBuf>, max_rooms: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(rooms)),
            writer: Arc::new(Mutex::new(())),
            path: path.map(Arc::new),
            max_rooms: max_rooms.max(1),
        }
    }

    /// Open the store at `path`, loading any rooms saved there. A missing
    /// file is an empty store. Holds at most `max_rooms` configs, forgetting
    /// the oldest first.
    pub async fn open(path: Option<PathBuf>, max_rooms: usize) -> Result<Self, StoreError> {
        let Some(path) = path else {
            return Ok(Self::in_memory(max_rooms));
        };
        let mut rooms = match tokio::fs::read(&path).await {
            Ok(raw) => Rooms::from_file(serde_json::from_slice::<StoreFile>(&raw)?.rooms),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Rooms::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let evicted = rooms.evict_to(max_rooms.max(1));
        info!(
            path = %path.display(),
            rooms = rooms.by_id.len(),
            evicted,
            "Room store loaded"
        );
        Ok(Self::with_rooms(rooms, Some(path), max_rooms))
    }

    pub async fn get(&self, id: &RoomId) -> Option<RoomConfig> {
        self.rooms
            .read()
            .await
            .by_id
            .get(id)
            .map(|room| room.config.clone())
    }

    /// Record `config` for a new room. The first writer wins: returns
    /// `false` and leaves the stored config alone if `id` already exists.
    pub async fn insert_new(&self, id: RoomId, config: RoomConfig) -> Result<bool, StoreError> {
        {
            let mut rooms = self.rooms.write().await;
            if rooms.by_id.contains_key(&id) {
                return Ok(false);
            }
            rooms.push(id.clone(), config);
            let evicted = rooms.evict_to(self.max_rooms);
            if evicted > 0 {
                info!(evicted, max_rooms = self.max_rooms, "Forgot oldest rooms");
            }
        }

        if let Some(path) = &self.path {
            if let Err(e) = self.persist(path).await {
                self.rooms.write().await.remove(&id);
                return Err(e);
            }
        }
        Ok(true)
    }

    /// Write the current map. The snapshot is taken after acquiring the
    /// writer lock, so the last write to finish always carries every insert
    /// that preceded it.
    async fn persist(&self, path: &Path) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let content = {
            let rooms = self.rooms.read().await;
            serde_json::to_vec_pretty(&rooms.snapshot())?
        };
        write_atomic(path, &content).await
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await.map_err(|e| {
        error!(path = %tmp.display(), error = %e, "Failed to write room store");
        io_err(e)
    })?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        error!(from = %tmp.display(), to = %path.display(), error = %e, "Failed to replace room store");
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}
