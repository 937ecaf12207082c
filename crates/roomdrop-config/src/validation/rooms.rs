//! Room admission and lifecycle limits.

use crate::schema::RoomdropConfig;

use super::helpers::{validate_range, validate_range_u64};

pub(crate) fn validate_rooms(errors: &mut Vec<String>, config: &RoomdropConfig) {
    let rooms = &config.rooms;
    validate_range(
        errors,
        "rooms.default_max_concurrent",
        rooms.default_max_concurrent,
        1,
        100,
    );
    validate_range(
        errors,
        "rooms.max_concurrent_limit",
        rooms.max_concurrent_limit,
        1,
        100,
    );
    if rooms.default_max_concurrent > rooms.max_concurrent_limit {
        errors.push(format!(
            "rooms.default_max_concurrent ({}) exceeds rooms.max_concurrent_limit ({})",
            rooms.default_max_concurrent, rooms.max_concurrent_limit
        ));
    }
    validate_range(errors, "rooms.room_id_length", rooms.room_id_length, 6, 32);
    validate_range_u64(errors, "rooms.idle_ttl_secs", rooms.idle_ttl_secs, 10, 86_400);
    validate_range_u64(
        errors,
        "rooms.reap_interval_secs",
        rooms.reap_interval_secs,
        1,
        3_600,
    );
    validate_range(errors, "rooms.outbox_capacity", rooms.outbox_capacity, 16, 65_536);
}
