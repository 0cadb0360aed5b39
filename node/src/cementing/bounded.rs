//! Bounded cementing.
//!
//! The target chain is walked upward from its cemented frontier. When the
//! walk meets a receive whose send is not cemented yet, the span below the
//! receive is queued and the send becomes the next target. Targets live in
//! a fixed-capacity worklist; targets pushed out of it by a long dependency
//! chain land in a fixed-capacity checkpoint buffer and are revisited later,
//! and the original hash is revisited last. Memory stays bounded no matter
//! how far the dependencies reach.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bounded_vec_deque::BoundedVecDeque;
use orv_ledger::{Ledger, WriteGuard, Writer};
use orv_types::{Account, Block, BlockHash, ConfirmationHeightInfo};
use orv_utils::{DetailType, StatType, Stats};
use tracing::{debug, info, trace};

use super::batch_write_size::BatchWriteSizeManager;
use super::write_details::{WriteDetails, WriteDetailsQueue};
use super::{effective_height, first_uncemented, load_block, uncemented_source, CementObservers};
use crate::config::ConfirmationHeightConfig;
use crate::CementError;

/// Capacity of the worklist, the checkpoint buffer and the map of
/// not-yet-written confirmation heights.
pub(crate) const MAX_ITEMS: usize = 131_072;

/// Blocks walked before checking whether cementing was stopped.
const BATCH_READ_SIZE: u64 = 65_536;

enum Walk {
    /// Every block up to the target can be cemented.
    Reached(WriteDetails),
    /// `source` must be cemented first. `below` is the span under the
    /// receive that can already be cemented.
    Blocked {
        below: Option<WriteDetails>,
        source: BlockHash,
    },
    Stopped,
}

pub struct BoundedCementer {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    stopped: Arc<AtomicBool>,
    max_items: usize,
    /// Confirmation heights as they will be once `pending` is written.
    accounts_confirmed: HashMap<Account, ConfirmationHeightInfo>,
    pending: WriteDetailsQueue,
    batch_write_size: BatchWriteSizeManager,
    batch_separate_pending_min_time: Duration,
    max_pending_writes: usize,
    processing_started: Instant,
}

impl BoundedCementer {
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
            max_items: MAX_ITEMS,
            accounts_confirmed: HashMap::new(),
            pending: WriteDetailsQueue::default(),
            batch_write_size: BatchWriteSizeManager::new(config.min_batch_write_size),
            batch_separate_pending_min_time: Duration::from_millis(
                config.batch_separate_pending_min_time_ms,
            ),
            max_pending_writes: config.max_pending_writes,
            processing_started: Instant::now(),
        }
    }

    /// Shrink the worklist and checkpoint capacity.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear_process_vars(&mut self) {
        self.accounts_confirmed.clear();
        self.pending.clear();
    }

    /// Cement `original` and everything it depends on.
    ///
    /// Spans are queued as they are discovered and written whenever a batch
    /// fills up, writes are forced, or the walk finished and nothing else is
    /// waiting. Whatever is left stays pending for [`Self::write_pending`].
    pub fn process(
        &mut self,
        original: &Block,
        observers: &CementObservers,
        awaiting: &dyn Fn() -> usize,
    ) -> Result<(), CementError> {
        if self.pending.is_empty() {
            self.accounts_confirmed.clear();
            self.processing_started = Instant::now();
        }

        let original_hash = original.hash();
        let mut targets: BoundedVecDeque<BlockHash> = BoundedVecDeque::new(self.max_items);
        let mut checkpoints: BoundedVecDeque<BlockHash> = BoundedVecDeque::new(self.max_items);
        targets.push_back(original_hash);
        let mut first_iteration = true;

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            let target = match targets.back() {
                Some(hash) => *hash,
                None => {
                    if let Some(checkpoint) = checkpoints.pop_back() {
                        targets.push_back(checkpoint);
                        continue;
                    }
                    let cemented =
                        effective_height(&self.ledger, &self.accounts_confirmed, &original.account())?;
                    if original.height() <= cemented.height {
                        break;
                    }
                    // both buffers overflowed; start over from the original
                    targets.push_back(original_hash);
                    continue;
                }
            };

            let block = load_block(&self.ledger, &target)?;
            let account = block.account();
            let cemented = effective_height(&self.ledger, &self.accounts_confirmed, &account)?;
            if block.height() <= cemented.height {
                if first_iteration {
                    self.stats
                        .inc(StatType::ConfirmationHeight, DetailType::AlreadyCemented);
                    observers.already_cemented.notify(&target);
                }
                first_iteration = false;
                targets.pop_back();
                continue;
            }
            first_iteration = false;

            match self.walk(&account, &cemented, &block)? {
                Walk::Stopped => break,
                Walk::Reached(details) => {
                    self.enqueue(details);
                    targets.pop_back();
                }
                Walk::Blocked { below, source } => {
                    if let Some(details) = below {
                        self.enqueue(details);
                    }
                    trace!(%target, %source, "cementing source chain first");
                    if let Some(evicted) = targets.push_back(source) {
                        checkpoints.push_back(evicted);
                    }
                }
            }

            let finished = targets.is_empty() && checkpoints.is_empty();
            self.flush_if_due(finished, observers, awaiting)?;
        }
        Ok(())
    }

    /// Walk from the first uncemented block of `account` up to `top`.
    fn walk(
        &self,
        account: &Account,
        cemented: &ConfirmationHeightInfo,
        top: &Block,
    ) -> Result<Walk, CementError> {
        let bottom_height = cemented.height + 1;
        let bottom_hash = first_uncemented(&self.ledger, account, cemented)?;
        let mut hash = bottom_hash;
        let mut height = bottom_height;
        let mut read = 0u64;

        loop {
            let block = load_block(&self.ledger, &hash)?;
            if let Some(source) = uncemented_source(&self.ledger, &self.accounts_confirmed, &block)? {
                let below = (height > bottom_height).then(|| WriteDetails {
                    account: *account,
                    bottom_height,
                    bottom_hash,
                    top_height: height - 1,
                    top_hash: block.previous(),
                });
                return Ok(Walk::Blocked { below, source });
            }
            if height >= top.height() {
                return Ok(Walk::Reached(WriteDetails {
                    account: *account,
                    bottom_height,
                    bottom_hash,
                    top_height: height,
                    top_hash: hash,
                }));
            }
            hash = block.successor().ok_or(CementError::MissingSideband(hash))?;
            height += 1;
            read += 1;
            if read % BATCH_READ_SIZE == 0 && self.stopped.load(Ordering::SeqCst) {
                return Ok(Walk::Stopped);
            }
        }
    }

    fn enqueue(&mut self, details: WriteDetails) {
        self.accounts_confirmed.insert(
            details.account,
            ConfirmationHeightInfo::new(details.top_height, details.top_hash),
        );
        self.pending.push_back(details);
    }

    fn flush_if_due(
        &mut self,
        finished: bool,
        observers: &CementObservers,
        awaiting: &dyn Fn() -> usize,
    ) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch_full =
            self.pending.total_pending_blocks() >= self.batch_write_size.current() as u64;
        let force = self.pending.len() >= self.max_pending_writes
            || self.accounts_confirmed.len() >= self.max_items;
        let should_output = finished
            && (awaiting() == 0
                || self.processing_started.elapsed() >= self.batch_separate_pending_min_time);
        if !(batch_full || force || should_output) {
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
                debug!(
                    pending = self.pending.len(),
                    "write token busy, cementing continues in memory"
                );
                Ok(())
            }
        }
    }

    /// Write every pending span, waiting for the write token.
    pub fn write_pending(&mut self, observers: &CementObservers) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let guard = self.ledger.write_queue().wait(Writer::ConfirmationHeight);
        self.write_with_guard(guard, observers)
    }

    /// Write the queued spans, committing every `batch_write_size` blocks and
    /// letting other writers in between commits.
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
            let mut current = effective_height(&ledger, &written, &details.account)?;
            if details.top_height <= current.height {
                continue;
            }
            let (mut height, mut hash) = if current.height >= details.bottom_height {
                (
                    current.height + 1,
                    first_uncemented(&ledger, &details.account, &current)?,
                )
            } else {
                debug_assert_eq!(current.height + 1, details.bottom_height);
                (details.bottom_height, details.bottom_hash)
            };

            loop {
                let block = Arc::new(load_block(&ledger, &hash)?);
                let successor = block.successor();
                cemented.push(block);
                let reached_top = height >= details.top_height;
                let batch_full = cemented.len() >= self.batch_write_size.current();

                if reached_top || batch_full {
                    let new = ConfirmationHeightInfo::new(height, hash);
                    ledger.write_confirmation_height(txn.as_mut(), &details.account, &current, &new)?;
                    written.insert(details.account, new);
                    current = new;
                }

                if batch_full && !(reached_top && self.pending.is_empty()) {
                    txn.commit()?;
                    guard.release();
                    self.finish_batch(std::mem::take(&mut cemented), started, observers);
                    guard = queue.wait(Writer::ConfirmationHeight);
                    txn = ledger.store().begin_write();
                    written.clear();
                    started = Instant::now();
                }

                if reached_top {
                    break;
                }
                hash = successor.ok_or(CementError::MissingSideband(hash))?;
                height += 1;
            }
        }

        if !cemented.is_empty() {
            txn.commit()?;
        }
        guard.release();
        self.finish_batch(cemented, started, observers);
        self.accounts_confirmed.clear();
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
            DetailType::BlocksCementedBounded,
            count,
        );
        self.stats
            .inc(StatType::ConfirmationHeight, DetailType::WriteBatch);
        self.batch_write_size.adjust(elapsed, cemented.len());
        info!(
            blocks = count,
            elapsed_ms = elapsed.as_millis() as u64,
            batch_write_size = self.batch_write_size.current(),
            "cemented bounded batch"
        );
        for block in &cemented {
            observers.cemented.notify(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cementing::test_chain::{recording_observers, Fixture};
    use orv_types::Account;

    fn cementer(fixture: &Fixture, min_batch: usize) -> BoundedCementer {
        let config = ConfirmationHeightConfig {
            min_batch_write_size: min_batch,
            batch_separate_pending_min_time_ms: 0,
            ..Default::default()
        };
        BoundedCementer::new(
            Arc::clone(&fixture.ledger),
            Arc::new(Stats::new()),
            Arc::new(AtomicBool::new(false)),
            &config,
        )
    }

    fn idle() -> usize {
        0
    }

    #[test]
    fn cements_single_chain_in_order() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let dest = Account::from_u64(42);
        let sends: Vec<Block> = (0..3).map(|_| fixture.send(genesis, dest, 10)).collect();
        let (observers, cemented, _) = recording_observers();

        let mut cementer = cementer(&fixture, 16_384);
        cementer.process(&sends[2], &observers, &idle).unwrap();
        cementer.write_pending(&observers).unwrap();

        let heights: Vec<u64> = cemented.lock().unwrap().iter().map(|b| b.height()).collect();
        assert_eq!(heights, vec![2, 3, 4]);
        assert_eq!(fixture.height(&genesis), 4);
        assert_eq!(fixture.ledger.cemented_count(), 4);
        assert!(!cementer.has_pending_writes());
    }

    #[test]
    fn already_cemented_is_reported_without_writes() {
        let fixture = Fixture::new();
        let genesis_block = fixture
            .ledger
            .block(&fixture.ledger.constants.genesis_hash())
            .unwrap()
            .unwrap();
        let (observers, cemented, already) = recording_observers();
        let commits = fixture.store.commit_count();

        let mut cementer = cementer(&fixture, 16_384);
        cementer.process(&genesis_block, &observers, &idle).unwrap();
        cementer.write_pending(&observers).unwrap();

        assert_eq!(*already.lock().unwrap(), vec![genesis_block.hash()]);
        assert!(cemented.lock().unwrap().is_empty());
        assert_eq!(fixture.store.commit_count(), commits);
    }

    #[test]
    fn receive_waits_for_its_source() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let alice = Account::from_u64(7);
        let send1 = fixture.send(genesis, alice, 100);
        let open = fixture.open(alice, send1.hash());
        let send2 = fixture.send(genesis, alice, 50);
        let receive = fixture.receive(alice, send2.hash());
        let (observers, cemented, _) = recording_observers();

        let mut cementer = cementer(&fixture, 16_384);
        cementer.process(&receive, &observers, &idle).unwrap();
        cementer.write_pending(&observers).unwrap();

        let order: Vec<BlockHash> = cemented.lock().unwrap().iter().map(|b| b.hash()).collect();
        let pos = |h: BlockHash| order.iter().position(|x| *x == h).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos(send1.hash()) < pos(open.hash()));
        assert!(pos(send2.hash()) < pos(receive.hash()));
        assert!(pos(open.hash()) < pos(receive.hash()));
        assert_eq!(fixture.height(&alice), 2);
        assert_eq!(fixture.height(&genesis), 3);
    }

    #[test]
    fn small_batches_commit_separately() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let dest = Account::from_u64(42);
        let sends: Vec<Block> = (0..5).map(|_| fixture.send(genesis, dest, 1)).collect();
        let (observers, cemented, _) = recording_observers();
        let commits = fixture.store.commit_count();

        let mut cementer = cementer(&fixture, 2);
        cementer.process(&sends[4], &observers, &idle).unwrap();
        cementer.write_pending(&observers).unwrap();

        assert_eq!(cemented.lock().unwrap().len(), 5);
        assert_eq!(fixture.height(&genesis), 6);
        assert_eq!(fixture.store.commit_count() - commits, 3);
    }

    #[test]
    fn long_dependency_chain_survives_tiny_buffers() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        // each account opens from the previous one, five levels deep
        let mut previous_account = genesis;
        let mut last_open = None;
        for i in 1..=5u64 {
            let account = Account::from_u64(1000 + i);
            let send = fixture.send(previous_account, account, 1_000_000 / i as u128);
            last_open = Some(fixture.open(account, send.hash()));
            previous_account = account;
        }
        let last_open = last_open.unwrap();
        let (observers, cemented, _) = recording_observers();

        let mut cementer = cementer(&fixture, 16_384).with_max_items(2);
        cementer.process(&last_open, &observers, &idle).unwrap();
        cementer.write_pending(&observers).unwrap();

        assert_eq!(fixture.height(&Account::from_u64(1005)), 1);
        assert_eq!(fixture.height(&genesis), 2);
        for i in 1..5u64 {
            assert_eq!(fixture.height(&Account::from_u64(1000 + i)), 2);
        }
        assert_eq!(cemented.lock().unwrap().len(), 10);
    }

    #[test]
    fn stopped_cementer_writes_nothing() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let send = fixture.send(genesis, Account::from_u64(3), 1);
        let (observers, cemented, _) = recording_observers();
        let stopped = Arc::new(AtomicBool::new(true));
        let mut cementer = BoundedCementer::new(
            Arc::clone(&fixture.ledger),
            Arc::new(Stats::new()),
            stopped,
            &ConfirmationHeightConfig::default(),
        );
        cementer.process(&send, &observers, &idle).unwrap();
        assert!(!cementer.has_pending_writes());
        assert!(cemented.lock().unwrap().is_empty());
    }
}
