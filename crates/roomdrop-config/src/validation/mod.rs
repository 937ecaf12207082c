//! Full configuration validation.
//!
//! Each section has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod rooms;
mod server;
mod storage;

#[cfg(test)]
mod tests;

use crate::schema::RoomdropConfig;
use roomdrop_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RoomdropConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    server::validate_server(&mut errors, config);
    rooms::validate_rooms(&mut errors, config);
    storage::validate_storage(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
