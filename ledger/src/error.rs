use orv_types::{Account, BlockHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {0} referenced by the ledger is missing")]
    MissingBlock(BlockHash),

    #[error("account not found: {0}")]
    AccountNotFound(Account),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(#[from] orv_store::StoreError),
}
