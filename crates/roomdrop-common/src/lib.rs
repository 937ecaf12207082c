pub mod errors;
pub mod id;

pub use errors::{ConfigError, RoomdropError, StoreError, TransferError};
pub use id::{new_id, ClientId, RoomId, ROOM_ID_ALPHABET};

pub type Result<T> = std::result::Result<T, RoomdropError>;
