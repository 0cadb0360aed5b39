//! Genesis and epoch parameters, one set per network.
//!
//! The genesis block is an open block that bootstraps a network: it has no
//! predecessor, holds the whole supply and is its own representative. Each
//! network derives a distinct genesis account so genesis hashes never
//! collide across networks.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use orv_types::{Account, Amount, Block, BlockHash, BlockType, Link, NetworkId};

/// Marker placed in the `link` field of epoch-upgrade blocks.
const EPOCH_V1_TAG: &[u8] = b"epoch v1 block";

#[derive(Clone, Debug)]
pub struct LedgerConstants {
    pub network: NetworkId,
    pub genesis_account: Account,
    pub genesis_amount: Amount,
    pub genesis_block: Block,
    pub epoch_link: Link,
}

impl LedgerConstants {
    pub fn new(network: NetworkId) -> Self {
        let genesis_account = Account::new(derive_bytes(network.as_str().as_bytes()));
        let genesis_amount = Amount::MAX;
        let genesis_block = Block::new(
            BlockType::Open,
            genesis_account,
            BlockHash::ZERO,
            genesis_account,
            genesis_amount,
            Link::from(genesis_account),
        );
        let mut epoch = [0u8; 32];
        epoch[..EPOCH_V1_TAG.len()].copy_from_slice(EPOCH_V1_TAG);
        Self {
            network,
            genesis_account,
            genesis_amount,
            genesis_block,
            epoch_link: Link::new(epoch),
        }
    }

    pub fn dev() -> Self {
        Self::new(NetworkId::Dev)
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_block.hash()
    }
}

fn derive_bytes(seed: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(b"orv genesis ");
    hasher.update(seed);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}
