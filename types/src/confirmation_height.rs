//! Per-account cemented position.

use serde::{Deserialize, Serialize};

use crate::BlockHash;

/// How much of an account chain is cemented.
///
/// `height` is the number of cemented blocks (0 when nothing is cemented) and
/// `frontier` is the hash of the highest cemented block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationHeightInfo {
    pub height: u64,
    pub frontier: BlockHash,
}

impl ConfirmationHeightInfo {
    pub fn new(height: u64, frontier: BlockHash) -> Self {
        Self { height, frontier }
    }
}
