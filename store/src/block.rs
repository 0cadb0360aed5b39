//! Block storage trait.

use crate::StoreError;
use orv_types::BlockHash;

/// Read access to the block table. Blocks are stored as serialized bytes
/// keyed by hash; the ledger owns the encoding.
pub trait BlockStore {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError>;

    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError>;

    /// Total number of blocks in the store.
    fn block_count(&self) -> Result<u64, StoreError>;
}
