use serde::{Deserialize, Serialize};

/// Room admission and lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Concurrent active pairings for rooms created without an explicit value.
    pub default_max_concurrent: u32,
    /// Upper clamp applied to a requested `maxConcurrent`.
    pub max_concurrent_limit: u32,
    /// Length of generated room codes.
    pub room_id_length: u32,
    /// Seconds an empty room is kept before its actor is reaped.
    pub idle_ttl_secs: u64,
    /// Interval between reaper sweeps.
    pub reap_interval_secs: u64,
    /// Queued outbound messages per connection before it is evicted.
    pub outbox_capacity: u32,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: 3,
            max_concurrent_limit: 10,
            room_id_length: 10,
            idle_ttl_secs: 300,
            reap_interval_secs: 60,
            outbox_capacity: 256,
        }
    }
}
