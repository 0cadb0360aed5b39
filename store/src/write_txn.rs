//! Buffered write transaction.

use crate::{AccountInfo, PendingInfo, PendingKey, StoreError};
use orv_types::{Account, BlockHash, ConfirmationHeightInfo};

/// A scoped write transaction.
///
/// Mutations are staged until [`WriteTxn::commit`]. Dropping an uncommitted
/// transaction aborts it.
pub trait WriteTxn {
    fn put_block(&mut self, hash: &BlockHash, block_bytes: &[u8]) -> Result<(), StoreError>;

    fn put_account(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError>;

    fn put_pending(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError>;

    fn delete_pending(&mut self, key: &PendingKey) -> Result<(), StoreError>;

    fn put_confirmation_height(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError>;

    /// Number of staged operations.
    fn pending_ops(&self) -> usize;

    /// Apply every staged operation atomically.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
