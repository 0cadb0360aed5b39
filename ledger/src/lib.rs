//! Block-lattice ledger.
//!
//! Each account has its own chain. Transfers are asynchronous: a send creates
//! a pending entry that the receiver later pockets with a receive (or open)
//! block. Consensus is only needed to resolve competing blocks for the same
//! chain position; the ledger records how far each chain is cemented.
//!
//! ## Module overview
//!
//! - [`ledger`]: block lookup, weights, processing, confirmation heights.
//! - [`block_factory`]: builds valid successor blocks against current state.
//! - [`constants`]: genesis and epoch parameters per network.
//! - [`rep_weights`]: cached representative weights.
//! - [`ledger_cache`]: atomic block / account / cemented counters.
//! - [`write_queue`]: single-writer discipline across subsystems.
//! - [`error`]: ledger error types.

pub mod block_factory;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod ledger_cache;
pub mod rep_weights;
pub mod write_queue;

pub use block_factory::BlockFactory;
pub use constants::LedgerConstants;
pub use error::LedgerError;
pub use ledger::{BlockStatus, Ledger};
pub use ledger_cache::LedgerCache;
pub use rep_weights::RepWeights;
pub use write_queue::{WriteGuard, WriteQueue, Writer};
