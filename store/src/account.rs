//! Account storage trait.

use crate::StoreError;
use orv_types::{Account, Amount, BlockHash};
use serde::{Deserialize, Serialize};

/// Per-account information stored in the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Hash of the latest block in this account's chain.
    pub head: BlockHash,
    /// Hash of the first block (height 1).
    pub open_block: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    /// Number of blocks in this account's chain.
    pub block_count: u64,
    /// Account version, upgraded by epoch blocks.
    #[serde(default)]
    pub epoch: u8,
}

pub trait AccountStore {
    fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError>;
    fn account_count(&self) -> Result<u64, StoreError>;
    fn iter_accounts(&self) -> Result<Vec<(Account, AccountInfo)>, StoreError>;
}
