use thiserror::Error;

/// Errors surfaced across the ledger core.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("replacing a transaction requires at least a 10% tip bump")]
    ReplaceUnderpriced,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::StorageError(err.to_string())
    }
}
