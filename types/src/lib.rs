//! Fundamental types for the ORV consensus core.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: accounts, hashes, roots, amounts, blocks, votes and the
//! per-account confirmation height record.

pub mod account;
pub mod amount;
pub mod block;
pub mod confirmation_height;
pub mod hash;
pub mod network;
pub mod vote;

pub use account::Account;
pub use amount::Amount;
pub use block::{Block, BlockSideband, BlockType};
pub use confirmation_height::ConfirmationHeightInfo;
pub use hash::{BlockHash, Link, QualifiedRoot, Root};
pub use network::NetworkId;
pub use vote::Vote;
