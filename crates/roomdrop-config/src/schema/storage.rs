use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistence of room configurations across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub persist_rooms: bool,
    /// Explicit location of the rooms file. Defaults to the platform data dir.
    pub path: Option<PathBuf>,
    /// Room configs kept before the oldest are forgotten.
    pub max_rooms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist_rooms: true,
            path: None,
            max_rooms: 10_000,
        }
    }
}

impl StorageConfig {
    /// Resolve the rooms file, or `None` when persistence is off or no data
    /// directory exists on this platform.
    pub fn rooms_path(&self) -> Option<PathBuf> {
        if !self.persist_rooms {
            return None;
        }
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("roomdrop").join("rooms.json")))
    }
}
