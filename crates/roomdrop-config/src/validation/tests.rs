//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

#[test]
fn default_config_validates() {
    let config = RoomdropConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_zero_max_concurrent() {
    let mut config = RoomdropConfig::default();
    config.rooms.default_max_concurrent = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("rooms.default_max_concurrent"));
}

#[test]
fn catches_default_above_limit() {
    let mut config = RoomdropConfig::default();
    config.rooms.default_max_concurrent = 8;
    config.rooms.max_concurrent_limit = 4;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("exceeds rooms.max_concurrent_limit"));
}

#[test]
fn catches_short_room_ids() {
    let mut config = RoomdropConfig::default();
    config.rooms.room_id_length = 3;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("rooms.room_id_length"));
}

#[test]
fn catches_tiny_outbox() {
    let mut config = RoomdropConfig::default();
    config.rooms.outbox_capacity = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("rooms.outbox_capacity"));
}

#[test]
fn catches_bad_bind_address() {
    let mut config = RoomdropConfig::default();
    config.server.bind = "not-an-ip".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("server.bind"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = RoomdropConfig::default();
    config.rooms.idle_ttl_secs = 1;
    config.rooms.reap_interval_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("rooms.idle_ttl_secs"));
    assert!(err.contains("rooms.reap_interval_secs"));
    assert!(err.contains("; "));
}

#[test]
fn ephemeral_port_is_allowed() {
    let mut config = RoomdropConfig::default();
    config.server.port = 0;
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_unbounded_room_store() {
    let mut config = RoomdropConfig::default();
    config.storage.max_rooms = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("storage.max_rooms"));
}
