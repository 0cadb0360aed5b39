use proptest::prelude::*;

use orv_types::{Account, Amount, Block, BlockHash, BlockSideband, BlockType, Link};

fn block_type() -> impl Strategy<Value = BlockType> {
    prop_oneof![
        Just(BlockType::Send),
        Just(BlockType::Receive),
        Just(BlockType::Open),
        Just(BlockType::Change),
        Just(BlockType::Epoch),
    ]
}

proptest! {
    /// Stored blocks keep their hash and sideband through bincode.
    #[test]
    fn stored_block_survives_bincode(
        ty in block_type(),
        account in prop::array::uniform32(0u8..),
        previous in prop::array::uniform32(0u8..),
        balance in any::<u128>(),
        height in 1u64..1_000_000,
    ) {
        let mut block = Block::new(
            ty,
            Account::new(account),
            BlockHash::new(previous),
            Account::new(account),
            Amount::raw(balance),
            Link::ZERO,
        );
        block.set_sideband(BlockSideband { height, successor: BlockHash::ZERO });
        let encoded = bincode::serialize(&block).unwrap();
        let decoded: Block = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded.hash(), block.hash());
        prop_assert_eq!(decoded.height(), height);
    }

    /// Changing only the balance always changes the hash.
    #[test]
    fn balance_is_hashed(a in any::<u128>(), b in any::<u128>()) {
        prop_assume!(a != b);
        let make = |raw| Block::new(
            BlockType::Change,
            Account::from_u64(1),
            BlockHash::from_u64(2),
            Account::from_u64(3),
            Amount::raw(raw),
            Link::ZERO,
        );
        prop_assert_ne!(make(a).hash(), make(b).hash());
    }

    /// Root is the previous hash unless the block opens the account.
    #[test]
    fn root_follows_previous(previous in prop::array::uniform32(0u8..)) {
        let block = Block::new(
            BlockType::Change,
            Account::from_u64(5),
            BlockHash::new(previous),
            Account::from_u64(5),
            Amount::ZERO,
            Link::ZERO,
        );
        let root = block.root();
        if previous == [0u8; 32] {
            let account = Account::from_u64(5);
            prop_assert_eq!(root.as_bytes(), account.as_bytes());
        } else {
            prop_assert_eq!(root.as_bytes(), &previous);
        }
    }
}
