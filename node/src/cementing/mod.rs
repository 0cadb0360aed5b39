//! Cementing: turning confirmed blocks into durable confirmation heights.
//!
//! A receive may only be cemented once the send it pockets is cemented, so
//! confirming one block can require cementing parts of many account chains.
//! Two interchangeable walkers resolve those dependencies:
//!
//! - [`BoundedCementer`] walks chains upward in read batches with a bounded
//!   worklist and a checkpoint buffer, and writes spans in sized batches.
//! - [`UnboundedCementer`] does a plain depth-first walk and remembers every
//!   block it will cement.
//!
//! [`CementationEngine`] picks one per hash and [`ConfirmationHeightProcessor`]
//! runs the engine on its own thread.

mod batch_write_size;
mod bounded;
mod engine;
mod processor;
mod unbounded;
mod write_details;

use std::collections::HashMap;
use std::sync::Arc;

use orv_ledger::Ledger;
use orv_types::{Account, Block, BlockHash, ConfirmationHeightInfo};
use orv_utils::ObserverSet;

use crate::CementError;

pub use bounded::BoundedCementer;
pub use engine::CementationEngine;
pub use processor::ConfirmationHeightProcessor;
pub use unbounded::UnboundedCementer;

/// Notifications emitted by cementing, always after the write committed.
#[derive(Default)]
pub struct CementObservers {
    /// One call per newly cemented block, in cementing order.
    pub cemented: ObserverSet<Arc<Block>>,
    /// A hash handed in for cementing was already cemented.
    pub already_cemented: ObserverSet<BlockHash>,
}

pub(crate) fn load_block(ledger: &Ledger, hash: &BlockHash) -> Result<Block, CementError> {
    ledger.block(hash)?.ok_or(CementError::MissingBlock(*hash))
}

/// Confirmation height of `account` as it will be once pending writes land.
pub(crate) fn effective_height(
    ledger: &Ledger,
    overlay: &HashMap<Account, ConfirmationHeightInfo>,
    account: &Account,
) -> Result<ConfirmationHeightInfo, CementError> {
    match overlay.get(account) {
        Some(info) => Ok(*info),
        None => Ok(ledger.confirmation_height(account)?),
    }
}

/// Lowest block of `account` above `cemented`.
pub(crate) fn first_uncemented(
    ledger: &Ledger,
    account: &Account,
    cemented: &ConfirmationHeightInfo,
) -> Result<BlockHash, CementError> {
    if cemented.height == 0 {
        let info = ledger
            .account_info(account)?
            .ok_or(orv_ledger::LedgerError::AccountNotFound(*account))?;
        Ok(info.open_block)
    } else {
        load_block(ledger, &cemented.frontier)?
            .successor()
            .ok_or(CementError::MissingSideband(cemented.frontier))
    }
}

/// For a receive or open, the send it pockets if that send is not cemented
/// yet (taking pending writes into account).
pub(crate) fn uncemented_source(
    ledger: &Ledger,
    overlay: &HashMap<Account, ConfirmationHeightInfo>,
    block: &Block,
) -> Result<Option<BlockHash>, CementError> {
    let Some(source) = block.source() else {
        return Ok(None);
    };
    // genesis pockets nothing that exists
    let Some(source_block) = ledger.block(&source)? else {
        return Ok(None);
    };
    let cemented = effective_height(ledger, overlay, &source_block.account())?;
    Ok((source_block.height() > cemented.height).then_some(source))
}
