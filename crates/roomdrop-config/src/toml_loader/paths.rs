//! Where the relay looks for its config file.

use std::path::{Path, PathBuf};

use roomdrop_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

const APP_DIR: &str = "roomdrop";
const FILE_NAME: &str = "relay.toml";

/// `<platform config dir>/roomdrop/relay.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Write the commented template to `path`, creating missing directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let fail = |action: &str, e: std::io::Error| {
        ConfigError::ParseError(format!("cannot {action} {}: {e}", path.display()))
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail("create parent of", e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| fail("write", e))?;

    info!(path = %path.display(), "Wrote default relay config");
    Ok(())
}
