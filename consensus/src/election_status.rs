//! Snapshot of an election's outcome, handed to observers and kept in the
//! recently cemented history.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use orv_types::{Amount, Block};

/// How an election ended, or that it has not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElectionStatusType {
    Ongoing,
    /// Confirmed by vote quorum.
    ActiveConfirmedQuorum,
    /// Confirmed because cementing reached the winner.
    ActiveConfirmationHeight,
    /// Cemented without any election.
    InactiveConfirmationHeight,
    /// Expired or cancelled.
    Stopped,
}

#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Arc<Block>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub election_start: SystemTime,
    pub election_end: Option<SystemTime>,
    pub election_duration: Duration,
    pub confirmation_request_count: u32,
    pub block_count: u32,
    pub voter_count: u32,
    pub status_type: ElectionStatusType,
}

impl ElectionStatus {
    pub fn new(winner: Arc<Block>, election_start: SystemTime) -> Self {
        Self {
            winner,
            tally: Amount::ZERO,
            final_tally: Amount::ZERO,
            election_start,
            election_end: None,
            election_duration: Duration::ZERO,
            confirmation_request_count: 0,
            block_count: 1,
            voter_count: 0,
            status_type: ElectionStatusType::Ongoing,
        }
    }

    /// Status for a block cemented with no election behind it.
    pub fn inactive(winner: Arc<Block>) -> Self {
        let now = SystemTime::now();
        Self {
            election_end: Some(now),
            status_type: ElectionStatusType::InactiveConfirmationHeight,
            ..Self::new(winner, now)
        }
    }
}
