//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# roomdrop relay configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# bind = "0.0.0.0"
# port = 8787

[rooms]
# default_max_concurrent = 3   # 1-100
# max_concurrent_limit = 10    # 1-100, clamp for createRoom
# room_id_length = 10          # 6-32
# idle_ttl_secs = 300          # 10-86400
# reap_interval_secs = 60      # 1-3600
# outbox_capacity = 256        # 16-65536

[storage]
# persist_rooms = true
# path = "/var/lib/roomdrop/rooms.json"
# max_rooms = 10000            # 1-1000000, oldest forgotten first

[logging]
# level = "info"               # trace, debug, info, warn, error
"##
    .to_string()
}
