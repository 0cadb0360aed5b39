//! Pending receive storage trait.

use crate::StoreError;
use orv_types::{Account, Amount, BlockHash};
use serde::{Deserialize, Serialize};

/// Key of a pending entry: the receiving account and the send block hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingKey {
    pub receiver: Account,
    pub send_hash: BlockHash,
}

impl PendingKey {
    pub fn new(receiver: Account, send_hash: BlockHash) -> Self {
        Self {
            receiver,
            send_hash,
        }
    }
}

/// An incoming transfer that has not been pocketed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
    #[serde(default)]
    pub epoch: u8,
}

pub trait PendingStore {
    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError>;

    /// Total number of pending receives across all accounts.
    fn pending_count(&self) -> Result<u64, StoreError>;
}
