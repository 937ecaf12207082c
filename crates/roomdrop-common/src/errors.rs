use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the chunked transfer protocol, surfaced to the sending or
/// receiving application. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("transfer is encrypted but no key is available")]
    MissingKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("frame too short: {0} bytes")]
    TruncatedFrame(usize),

    #[error("decryption failed")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("size mismatch: expected {expected} bytes, received {received}")]
    SizeMismatch { expected: u64, received: u64 },

    #[error("transport closed before transfer completed ({received} of {expected} bytes)")]
    Incomplete { expected: u64, received: u64 },

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RoomdropError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("rooms.port out of range".into());
        assert_eq!(
            err.to_string(),
            "config validation error: rooms.port out of range"
        );
    }

    #[test]
    fn transfer_error_display() {
        assert_eq!(TransferError::Decrypt.to_string(), "decryption failed");
        assert_eq!(
            TransferError::TruncatedFrame(5).to_string(),
            "frame too short: 5 bytes"
        );
        assert_eq!(
            TransferError::SizeMismatch {
                expected: 10,
                received: 7
            }
            .to_string(),
            "size mismatch: expected 10 bytes, received 7"
        );
        assert_eq!(
            TransferError::Incomplete {
                expected: 100,
                received: 40
            }
            .to_string(),
            "transport closed before transfer completed (40 of 100 bytes)"
        );
    }

    #[test]
    fn store_error_display_includes_path() {
        let err = StoreError::Io {
            path: PathBuf::from("/var/lib/roomdrop/rooms.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let text = err.to_string();
        assert!(text.contains("/var/lib/roomdrop/rooms.json"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn roomdrop_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: RoomdropError = config_err.into();
        assert!(matches!(err, RoomdropError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn roomdrop_error_from_transfer() {
        let err: RoomdropError = TransferError::MissingKey.into();
        assert!(matches!(err, RoomdropError::Transfer(_)));
        assert!(err.to_string().contains("no key"));
    }

    #[test]
    fn roomdrop_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: RoomdropError = io_err.into();
        assert!(matches!(err, RoomdropError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn transfer_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: TransferError = io_err.into();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[test]
    fn roomdrop_error_other_variants() {
        let err = RoomdropError::Network("timeout".into());
        assert_eq!(err.to_string(), "network error: timeout");

        let err = RoomdropError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
