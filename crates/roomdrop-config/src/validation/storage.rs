use crate::schema::RoomdropConfig;

use super::helpers::validate_range;

pub(crate) fn validate_storage(errors: &mut Vec<String>, config: &RoomdropConfig) {
    validate_range(
        errors,
        "storage.max_rooms",
        config.storage.max_rooms,
        1,
        1_000_000,
    );
}
