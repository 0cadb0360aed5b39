use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use orv_ledger::Ledger;
use orv_types::{Block, BlockHash};
use orv_utils::{DetailType, StatType, Stats};
use tracing::{error, warn};

use super::{BoundedCementer, CementObservers, UnboundedCementer};
use crate::config::{ConfirmationHeightConfig, ConfirmationHeightMode};
use crate::CementError;

/// Both cementing algorithms plus the rule choosing between them.
///
/// Synchronous: the processor thread drives it, and tests drive it directly.
/// At most one algorithm holds pending writes at any time.
pub struct CementationEngine {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    mode: ConfirmationHeightMode,
    unbounded_cutoff: u64,
    bounded: BoundedCementer,
    unbounded: UnboundedCementer,
    observers: Arc<CementObservers>,
}

impl CementationEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        stopped: Arc<AtomicBool>,
        config: &ConfirmationHeightConfig,
        observers: Arc<CementObservers>,
    ) -> Self {
        Self {
            bounded: BoundedCementer::new(
                Arc::clone(&ledger),
                Arc::clone(&stats),
                Arc::clone(&stopped),
                config,
            ),
            unbounded: UnboundedCementer::new(
                Arc::clone(&ledger),
                Arc::clone(&stats),
                stopped,
                config,
            ),
            ledger,
            stats,
            mode: config.mode,
            unbounded_cutoff: config.unbounded_cutoff,
            observers,
        }
    }

    pub fn observers(&self) -> &Arc<CementObservers> {
        &self.observers
    }

    pub fn unbounded(&self) -> &UnboundedCementer {
        &self.unbounded
    }

    pub fn has_pending_writes(&self) -> bool {
        self.bounded.has_pending_writes() || self.unbounded.has_pending_writes()
    }

    /// Whether the next hash would go to the unbounded algorithm.
    pub fn uses_unbounded(&self) -> bool {
        self.force_unbounded() || self.valid_unbounded()
    }

    fn force_unbounded(&self) -> bool {
        self.unbounded.has_pending_writes() || self.mode == ConfirmationHeightMode::Unbounded
    }

    fn valid_unbounded(&self) -> bool {
        self.mode == ConfirmationHeightMode::Automatic
            && self.within_unbounded_cutoff()
            && !self.bounded.has_pending_writes()
    }

    fn within_unbounded_cutoff(&self) -> bool {
        let blocks = self.ledger.block_count();
        let cemented = self.ledger.cemented_count();
        blocks < self.unbounded_cutoff || blocks - self.unbounded_cutoff < cemented
    }

    /// Cement up to `hash`. Failures are logged and the hash dropped.
    pub fn process(&mut self, hash: &BlockHash, awaiting: &dyn Fn() -> usize) {
        let block = match self.ledger.block(hash) {
            Ok(Some(block)) => block,
            Ok(None) => {
                self.stats
                    .inc(StatType::ConfirmationHeight, DetailType::MissingBlock);
                warn!(%hash, "confirmed block missing from ledger, skipping");
                return;
            }
            Err(e) => {
                error!(%hash, error = %e, "failed to load confirmed block");
                return;
            }
        };
        self.process_block(&block, awaiting);
    }

    pub fn process_block(&mut self, block: &Block, awaiting: &dyn Fn() -> usize) {
        let unbounded = self.uses_unbounded();
        let result = if unbounded {
            self.unbounded.process(block, &self.observers, awaiting)
        } else {
            self.bounded.process(block, &self.observers, awaiting)
        };
        if let Err(e) = result {
            self.report(&block.hash(), e, unbounded);
        }
    }

    /// Flush whichever algorithm holds pending writes.
    pub fn write_pending(&mut self) {
        if self.bounded.has_pending_writes() {
            if let Err(e) = self.bounded.write_pending(&self.observers) {
                error!(error = %e, "failed to write bounded cementing batch");
                self.bounded.clear_process_vars();
            }
        } else if self.unbounded.has_pending_writes() {
            if let Err(e) = self.unbounded.write_pending(&self.observers) {
                error!(error = %e, "failed to write unbounded cementing batch");
                self.unbounded.clear_process_vars();
            }
        }
    }

    pub fn clear_process_vars(&mut self) {
        self.bounded.clear_process_vars();
        self.unbounded.clear_process_vars();
    }

    fn report(&mut self, hash: &BlockHash, e: CementError, unbounded: bool) {
        if let CementError::MissingBlock(missing) = &e {
            self.stats
                .inc(StatType::ConfirmationHeight, DetailType::MissingBlock);
            warn!(%hash, %missing, "cementing hit a missing block");
        } else {
            error!(%hash, error = %e, unbounded, "cementing failed, dropping hash");
        }
        if unbounded {
            self.unbounded.clear_process_vars();
        } else {
            self.bounded.clear_process_vars();
        }
    }
}
