//! Statistics collection and reporting utilities.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Subsystem a counter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatType {
    Election,
    ElectionVote,
    ActiveElections,
    VoteCache,
    ConfirmationHeight,
    Ledger,
}

/// What a counter measures within its subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DetailType {
    // votes
    Invalid,
    Vote,
    Replay,
    Ignored,
    Indeterminate,
    Late,
    Live,
    Rebroadcast,
    Cache,
    // election lifecycle
    Started,
    Confirmed,
    ConfirmedByHeight,
    ExpiredConfirmed,
    ExpiredUnconfirmed,
    Cancelled,
    Trimmed,
    Erased,
    InsertFailed,
    // behaviors
    Normal,
    Hinted,
    Optimistic,
    Manual,
    // election actions
    BroadcastBlock,
    BroadcastVote,
    GenerateFinalVote,
    ConfirmationRequest,
    ForkReplaced,
    PublishRejected,
    WinnerSwitched,
    // cementing
    BlocksCemented,
    BlocksCementedBounded,
    BlocksCementedUnbounded,
    AlreadyCemented,
    MissingBlock,
    WriteBatch,
    // ledger
    Progress,
    Rejected,
}

/// Thread-safe counters keyed by `(StatType, DetailType)`.
pub struct Stats {
    counters: Mutex<BTreeMap<(StatType, DetailType), u64>>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn inc(&self, stat: StatType, detail: DetailType) {
        self.add(stat, detail, 1);
    }

    pub fn add(&self, stat: StatType, detail: DetailType, value: u64) {
        if value == 0 {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry((stat, detail)).or_insert(0) += value;
    }

    pub fn count(&self, stat: StatType, detail: DetailType) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(stat, detail))
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<(StatType, DetailType), u64> {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
