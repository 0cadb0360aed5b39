//! 32-byte identifiers: block hashes, roots and links.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Account;

/// Declares a 32-byte newtype with the shared constructor and formatting surface.
macro_rules! bytes32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Places `value` big-endian in the trailing eight bytes.
            pub fn from_u64(value: u64) -> Self {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), crate::hash::hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", crate::hash::hex::encode(&self.0))
            }
        }
    };
}

pub(crate) use bytes32;

bytes32! {
    /// A 32-byte block hash, the blake2b-256 digest of a block's contents.
    BlockHash
}

bytes32! {
    /// The chain position a block extends: its `previous` hash, or the
    /// account itself for an open block.
    Root
}

bytes32! {
    /// Multi-purpose block field: destination account for sends, source
    /// hash for receives and opens, epoch marker for epoch blocks.
    Link
}

impl From<BlockHash> for Root {
    fn from(hash: BlockHash) -> Self {
        Self(hash.0)
    }
}

impl From<Account> for Root {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl From<BlockHash> for Link {
    fn from(hash: BlockHash) -> Self {
        Self(hash.0)
    }
}

impl From<Account> for Link {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl Link {
    pub fn as_block_hash(&self) -> BlockHash {
        BlockHash(self.0)
    }

    pub fn as_account(&self) -> Account {
        Account::new(self.0)
    }
}

/// Key of one election: the contested root together with the previous
/// block hash (zero for open blocks).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }
}

impl fmt::Debug for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedRoot({:?}, {:?})", self.root, self.previous)
    }
}

impl fmt::Display for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.previous)
    }
}

// Inline hex encoding to avoid adding the `hex` crate as a dependency of types.
pub(crate) mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default() {
        assert_eq!(BlockHash::default(), BlockHash::ZERO);
        assert!(Root::ZERO.is_zero());
    }

    #[test]
    fn from_u64_is_big_endian_in_tail() {
        let hash = BlockHash::from_u64(0x0102);
        assert_eq!(hash.as_bytes()[30], 0x01);
        assert_eq!(hash.as_bytes()[31], 0x02);
        assert!(hash.as_bytes()[..24].iter().all(|b| *b == 0));
    }

    #[test]
    fn display_is_full_hex() {
        let hash = BlockHash::new([0xab; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
        assert_eq!(format!("{:?}", hash), "BlockHash(abababab..)");
    }

    #[test]
    fn link_converts_both_ways() {
        let hash = BlockHash::from_u64(7);
        let link = Link::from(hash);
        assert_eq!(link.as_block_hash(), hash);
        assert_eq!(link.as_account().as_bytes(), hash.as_bytes());
    }

    #[test]
    fn qualified_root_orders_by_root_first() {
        let a = QualifiedRoot::new(Root::from_u64(1), BlockHash::from_u64(9));
        let b = QualifiedRoot::new(Root::from_u64(2), BlockHash::from_u64(0));
        assert!(a < b);
    }
}
