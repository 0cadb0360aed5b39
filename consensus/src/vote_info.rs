//! Vote data: one representative's latest vote inside an election, and the
//! codes returned when a vote is processed.

use std::time::Instant;

use orv_types::{BlockHash, Vote};
use orv_utils::DetailType;

/// The result of processing a vote for one block hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoteCode {
    /// Vote failed signature or structural checks upstream.
    Invalid,
    /// Not newer than the representative's recorded vote.
    Replay,
    /// Accepted and counted.
    Vote,
    /// No election for the hash; cached, or the voter is below the
    /// principal weight floor.
    Indeterminate,
    /// Newer, but arrived inside the representative's cooldown.
    Ignored,
    /// The hash belongs to an election that already finished.
    Late,
}

impl VoteCode {
    pub fn detail(self) -> DetailType {
        match self {
            VoteCode::Invalid => DetailType::Invalid,
            VoteCode::Replay => DetailType::Replay,
            VoteCode::Vote => DetailType::Vote,
            VoteCode::Indeterminate => DetailType::Indeterminate,
            VoteCode::Ignored => DetailType::Ignored,
            VoteCode::Late => DetailType::Late,
        }
    }
}

/// Where a vote came from. Only cached votes skip the cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoteSource {
    Live,
    Rebroadcast,
    Cache,
}

impl VoteSource {
    pub fn detail(self) -> DetailType {
        match self {
            VoteSource::Live => DetailType::Live,
            VoteSource::Rebroadcast => DetailType::Rebroadcast,
            VoteSource::Cache => DetailType::Cache,
        }
    }
}

/// Latest vote recorded for a representative within an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteInfo {
    /// Local arrival time, used for cooldown.
    pub time: Instant,
    pub timestamp: u64,
    pub hash: BlockHash,
}

impl VoteInfo {
    pub fn new(time: Instant, timestamp: u64, hash: BlockHash) -> Self {
        Self {
            time,
            timestamp,
            hash,
        }
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}
