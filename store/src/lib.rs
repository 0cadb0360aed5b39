//! Abstract storage traits for the ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Reads go straight to the backend and observe committed state. Writes are
//! buffered in a [`WriteTxn`] and become visible atomically on commit;
//! dropping the transaction without committing discards them.

pub mod account;
pub mod block;
pub mod confirmation_height;
pub mod error;
pub mod pending;
pub mod write_txn;

pub use account::{AccountInfo, AccountStore};
pub use block::BlockStore;
pub use confirmation_height::ConfirmationHeightStore;
pub use error::StoreError;
pub use pending::{PendingInfo, PendingKey, PendingStore};
pub use write_txn::WriteTxn;

/// Everything the ledger needs from a backend.
pub trait LedgerStore:
    AccountStore + BlockStore + ConfirmationHeightStore + PendingStore + Send + Sync
{
    /// Open a write transaction. Only one writer should be active at a time;
    /// callers serialize through the ledger's write queue.
    fn begin_write(&self) -> Box<dyn WriteTxn + '_>;
}
