//! In-memory atomic counters for frequently-queried ledger statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic cache of ledger counters. Seeded from the store at startup and
/// kept in sync as blocks are processed and cemented.
#[derive(Default)]
pub struct LedgerCache {
    block_count: AtomicU64,
    account_count: AtomicU64,
    cemented_count: AtomicU64,
}

impl LedgerCache {
    pub fn new(block_count: u64, account_count: u64, cemented_count: u64) -> Self {
        Self {
            block_count: AtomicU64::new(block_count),
            account_count: AtomicU64::new(account_count),
            cemented_count: AtomicU64::new(cemented_count),
        }
    }

    pub fn reset(&self, block_count: u64, account_count: u64, cemented_count: u64) {
        self.block_count.store(block_count, Ordering::SeqCst);
        self.account_count.store(account_count, Ordering::SeqCst);
        self.cemented_count.store(cemented_count, Ordering::SeqCst);
    }

    pub fn block_count(&self) -> u64 {
        self.block_count.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> u64 {
        self.account_count.load(Ordering::SeqCst)
    }

    pub fn cemented_count(&self) -> u64 {
        self.cemented_count.load(Ordering::SeqCst)
    }

    pub fn inc_block_count(&self) {
        self.block_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_account_count(&self) {
        self.account_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_cemented(&self, count: u64) {
        let cemented = self.cemented_count.fetch_add(count, Ordering::SeqCst) + count;
        debug_assert!(
            cemented <= self.block_count(),
            "cemented count {cemented} exceeds block count"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_updates() {
        let cache = LedgerCache::new(3, 1, 1);
        cache.inc_block_count();
        cache.inc_account_count();
        cache.add_cemented(2);
        assert_eq!(cache.block_count(), 4);
        assert_eq!(cache.account_count(), 2);
        assert_eq!(cache.cemented_count(), 3);
    }
}
