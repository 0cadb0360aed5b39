//! Unbounded cementing.
//!
//! A depth-first walk from the target down to each chain's cemented
//! frontier. Every block that will be cemented is collected on the way, and
//! so is the send behind every receive that is not cemented yet. Blocks are
//! cached for the duration of a run, so revisiting a chain after its sources
//! are done costs no reads. Memory grows with the size of the walk, which is
//! why the engine reserves this mode for small uncemented backlogs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orv_ledger::{Ledger, WriteGuard, Writer};
use orv_types::{Account, Block, BlockHash, ConfirmationHeightInfo};
use orv_utils::{DetailType, StatType, Stats};
use tracing::{debug, info};

use super::batch_write_size::BatchWriteSizeManager;
use super::{effective_height, load_block, uncemented_source, CementObservers};
use crate::config::ConfirmationHeightConfig;
use crate::CementError;

/// One account's pending advance together with the blocks it cements.
#[derive(Clone, Debug)]
pub(crate) struct ConfHeightDetails {
    pub account: Account,
    pub new_height: u64,
    pub new_frontier: BlockHash,
    /// Lowest first.
    pub cemented_blocks: Vec<Arc<Block>>,
}

pub struct UnboundedCementer {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    stopped: Arc<AtomicBool>,
    /// Confirmation heights as they will be once `pending` is written.
    iterated: HashMap<Account, ConfirmationHeightInfo>,
    pending: VecDeque<ConfHeightDetails>,
    pending_blocks: usize,
    block_cache: HashMap<BlockHash, Arc<Block>>,
    batch_write_size: BatchWriteSizeManager,
    batch_separate_pending_min_time: Duration,
    max_pending_writes: usize,
    processing_started: Instant,
}

impl UnboundedCementer {
    pub fn new(
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        stopped: Arc<AtomicBool>,
        config: &ConfirmationHeightConfig,
    ) -> Self {
        Self {
            ledger,
            stats,
            stopped,
            iterated: HashMap::new(),
            pending: VecDeque::new(),
            pending_blocks: 0,
            block_cache: HashMap::new(),
            batch_write_size: BatchWriteSizeManager::new(config.min_batch_write_size),
            batch_separate_pending_min_time: Duration::from_millis(
                config.batch_separate_pending_min_time_ms,
            ),
            max_pending_writes: config.max_pending_writes,
            processing_started: Instant::now(),
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn block_cache_len(&self) -> usize {
        self.block_cache.len()
    }

    pub fn clear_process_vars(&mut self) {
        self.iterated.clear();
        self.pending.clear();
        self.pending_blocks = 0;
        self.block_cache.clear();
    }

    fn get_block(&mut self, hash: &BlockHash) -> Result<Arc<Block>, CementError> {
        if let Some(block) = self.block_cache.get(hash) {
            return Ok(Arc::clone(block));
        }
        let block = Arc::new(load_block(&self.ledger, hash)?);
        self.block_cache.insert(*hash, Arc::clone(&block));
        Ok(block)
    }

    /// Cement `original` and everything it depends on.
    pub fn process(
        &mut self,
        original: &Block,
        observers: &CementObservers,
        awaiting: &dyn Fn() -> usize,
    ) -> Result<(), CementError> {
        if self.pending.is_empty() {
            self.clear_process_vars();
            self.processing_started = Instant::now();
        }

        let original_hash = original.hash();
        let mut stack = vec![original_hash];
        let mut first_iteration = true;

        while let Some(&target) = stack.last() {
            if self.stopped.load(Ordering::SeqCst) {
                return Ok(());
            }
            let top = self.get_block(&target)?;
            let account = top.account();
            let cemented = effective_height(&self.ledger, &self.iterated, &account)?;
            if top.height() <= cemented.height {
                if first_iteration {
                    self.stats
                        .inc(StatType::ConfirmationHeight, DetailType::AlreadyCemented);
                    observers.already_cemented.notify(&target);
                }
                first_iteration = false;
                stack.pop();
                continue;
            }
            first_iteration = false;

            let mut chain = Vec::new();
            let mut unmet_sources = Vec::new();
            let mut block = top;
            loop {
                if let Some(source) = uncemented_source(&self.ledger, &self.iterated, &block)? {
                    unmet_sources.push(source);
                }
                let reached_bottom = block.height() <= cemented.height + 1;
                let previous = block.previous();
                chain.push(block);
                if reached_bottom {
                    break;
                }
                block = self.get_block(&previous)?;
            }

            if unmet_sources.is_empty() {
                chain.reverse();
                let new_height = cemented.height + chain.len() as u64;
                debug_assert_eq!(
                    chain.last().map(|b| b.height()),
                    Some(new_height),
                    "walk must end at the target"
                );
                self.iterated
                    .insert(account, ConfirmationHeightInfo::new(new_height, target));
                self.pending_blocks += chain.len();
                self.pending.push_back(ConfHeightDetails {
                    account,
                    new_height,
                    new_frontier: target,
                    cemented_blocks: chain,
                });
                stack.pop();
            } else {
                // collected top-down, so the lowest receive's source is handled first
                stack.extend(unmet_sources);
            }
        }

        self.flush_if_due(observers, awaiting)
    }

    fn flush_if_due(
        &mut self,
        observers: &CementObservers,
        awaiting: &dyn Fn() -> usize,
    ) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let force = self.pending.len() >= self.max_pending_writes;
        let should_output = awaiting() == 0
            || self.processing_started.elapsed() >= self.batch_separate_pending_min_time
            || self.pending_blocks >= self.batch_write_size.current();
        if !(force || should_output) {
            return Ok(());
        }
        let queue = Arc::clone(self.ledger.write_queue());
        let guard = if force {
            Some(queue.wait(Writer::ConfirmationHeight))
        } else {
            queue.try_lock(Writer::ConfirmationHeight)
        };
        match guard {
            Some(guard) => self.write_with_guard(guard, observers),
            None => {
                debug!(pending = self.pending.len(), "write token busy, deferring cementing");
                Ok(())
            }
        }
    }

    /// Write every pending advance, waiting for the write token.
    pub fn write_pending(&mut self, observers: &CementObservers) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let guard = self.ledger.write_queue().wait(Writer::ConfirmationHeight);
        self.write_with_guard(guard, observers)
    }

    fn write_with_guard(
        &mut self,
        mut guard: WriteGuard,
        observers: &CementObservers,
    ) -> Result<(), CementError> {
        let ledger = Arc::clone(&self.ledger);
        let queue = Arc::clone(ledger.write_queue());
        let mut txn = ledger.store().begin_write();
        let mut written: HashMap<Account, ConfirmationHeightInfo> = HashMap::new();
        let mut cemented: Vec<Arc<Block>> = Vec::new();
        let mut started = Instant::now();

        while let Some(details) = self.pending.pop_front() {
            let current = effective_height(&ledger, &written, &details.account)?;
            if details.new_height <= current.height {
                continue;
            }
            let new = ConfirmationHeightInfo::new(details.new_height, details.new_frontier);
            ledger.write_confirmation_height(txn.as_mut(), &details.account, &current, &new)?;
            written.insert(details.account, new);
            cemented.extend(
                details
                    .cemented_blocks
                    .into_iter()
                    .filter(|block| block.height() > current.height),
            );

            if cemented.len() >= self.batch_write_size.current() && !self.pending.is_empty() {
                txn.commit()?;
                guard.release();
                self.finish_batch(std::mem::take(&mut cemented), started, observers);
                guard = queue.wait(Writer::ConfirmationHeight);
                txn = ledger.store().begin_write();
                written.clear();
                started = Instant::now();
            }
        }

        if !cemented.is_empty() {
            txn.commit()?;
        }
        guard.release();
        self.finish_batch(cemented, started, observers);
        self.clear_process_vars();
        Ok(())
    }

    fn finish_batch(
        &mut self,
        cemented: Vec<Arc<Block>>,
        started: Instant,
        observers: &CementObservers,
    ) {
        if cemented.is_empty() {
            return;
        }
        let count = cemented.len() as u64;
        let elapsed = started.elapsed();
        self.ledger.add_cemented(count);
        self.stats
            .add(StatType::ConfirmationHeight, DetailType::BlocksCemented, count);
        self.stats.add(
            StatType::ConfirmationHeight,
            DetailType::BlocksCementedUnbounded,
            count,
        );
        self.stats
            .inc(StatType::ConfirmationHeight, DetailType::WriteBatch);
        self.batch_write_size.adjust(elapsed, cemented.len());
        info!(
            blocks = count,
            elapsed_ms = elapsed.as_millis() as u64,
            "cemented unbounded batch"
        );
        for block in &cemented {
            observers.cemented.notify(block);
        }
    }
}
