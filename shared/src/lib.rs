pub mod error;
pub mod hash;

pub use error::LedgerError;
pub use hash::{hash_json, keccak256, ZERO_HASH};

pub type Result<T> = std::result::Result<T, LedgerError>;
