//! Blocks of the account-chain lattice.
//!
//! Every account owns a chain of blocks. A block's `previous` links it to the
//! account's prior head; open blocks have no previous and start the chain.
//! Receives and opens name the send they pocket through `link`.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::{Account, Amount, BlockHash, Link, QualifiedRoot, Root};

/// The role a block plays in its account chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Moves funds out; `link` is the destination account.
    Send,
    /// Pockets a pending send; `link` is the source block hash.
    Receive,
    /// First block of an account, pocketing its first send.
    Open,
    /// Changes the representative, balance unchanged.
    Change,
    /// Upgrades the account version; `link` is the epoch marker.
    Epoch,
}

/// Ledger-maintained metadata attached to a stored block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSideband {
    /// 1-based position in the account chain.
    pub height: u64,
    /// Next block in the chain, zero while this block is the head.
    pub successor: BlockHash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    block_type: BlockType,
    account: Account,
    previous: BlockHash,
    representative: Account,
    balance: Amount,
    link: Link,
    hash: BlockHash,
    sideband: Option<BlockSideband>,
}

impl Block {
    pub fn new(
        block_type: BlockType,
        account: Account,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        link: Link,
    ) -> Self {
        let hash = Self::compute_hash(
            block_type,
            &account,
            &previous,
            &representative,
            balance,
            &link,
        );
        Self {
            block_type,
            account,
            previous,
            representative,
            balance,
            link,
            hash,
            sideband: None,
        }
    }

    fn compute_hash(
        block_type: BlockType,
        account: &Account,
        previous: &BlockHash,
        representative: &Account,
        balance: Amount,
        link: &Link,
    ) -> BlockHash {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update([block_type as u8]);
        hasher.update(account.as_bytes());
        hasher.update(previous.as_bytes());
        hasher.update(representative.as_bytes());
        hasher.update(balance.number().to_be_bytes());
        hasher.update(link.as_bytes());
        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        BlockHash::new(out)
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn representative(&self) -> Account {
        self.representative
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    /// The chain position this block contests.
    pub fn root(&self) -> Root {
        if self.previous.is_zero() {
            Root::from(self.account)
        } else {
            Root::from(self.previous)
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous)
    }

    /// Hash of the send this block pockets, for receives and opens.
    pub fn source(&self) -> Option<BlockHash> {
        match self.block_type {
            BlockType::Receive | BlockType::Open => Some(self.link.as_block_hash()),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<Account> {
        match self.block_type {
            BlockType::Send => Some(self.link.as_account()),
            _ => None,
        }
    }

    pub fn sideband(&self) -> Option<&BlockSideband> {
        self.sideband.as_ref()
    }

    pub fn set_sideband(&mut self, sideband: BlockSideband) {
        self.sideband = Some(sideband);
    }

    /// Chain height, or 0 for a block the ledger has not stored yet.
    pub fn height(&self) -> u64 {
        self.sideband.map(|s| s.height).unwrap_or(0)
    }

    pub fn successor(&self) -> Option<BlockHash> {
        self.sideband
            .map(|s| s.successor)
            .filter(|successor| !successor.is_zero())
    }
}
