//! roomdrop relay configuration.
//!
//! TOML-based configuration with validation. All sections use defaults so
//! partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    LogLevel, LoggingConfig, RoomdropConfig, RoomsConfig, ServerConfig, StorageConfig,
    CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use roomdrop_common::ConfigError;

/// Load config from `path`, or from the platform default when `None`, and
/// reject it if validation fails.
pub fn load_config(path: Option<&Path>) -> Result<RoomdropConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[rooms]\nroom_id_length = 2\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_config_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 0);
    }
}
