//! Configuration schema types for the relay.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod rooms;
mod server;
mod storage;

pub use logging::*;
pub use rooms::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for the relay.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct RoomdropConfig {
    pub server: ServerConfig,
    pub rooms: RoomsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}
