//! Representative votes as delivered by the network layer.

use serde::{Deserialize, Serialize};

use crate::{Account, BlockHash};

/// A (signature-checked) vote from one representative covering one or more
/// block hashes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Account,
    /// Monotonic per-representative timestamp, or [`Vote::FINAL_TIMESTAMP`].
    pub timestamp: u64,
    pub hashes: Vec<BlockHash>,
}

impl Vote {
    /// Sentinel timestamp marking an irrevocable vote.
    pub const FINAL_TIMESTAMP: u64 = u64::MAX;

    pub fn new(voter: Account, timestamp: u64, hashes: Vec<BlockHash>) -> Self {
        Self {
            voter,
            timestamp,
            hashes,
        }
    }

    pub fn new_final(voter: Account, hashes: Vec<BlockHash>) -> Self {
        Self::new(voter, Self::FINAL_TIMESTAMP, hashes)
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Self::FINAL_TIMESTAMP
    }
}
