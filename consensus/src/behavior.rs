//! Why an election was started, which sets its limits and timers.

use std::time::Duration;

use orv_utils::DetailType;

/// The scheduler that requested an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElectionBehavior {
    /// Based on account priority; bounded by the container size.
    Normal,
    /// Based on accumulated vote weight in the vote cache.
    Hinted,
    /// Speculative confirmation of long uncemented chains.
    Optimistic,
    /// Operator-triggered; never refused for lack of room.
    Manual,
}

impl ElectionBehavior {
    /// Elections older than this are expired unless confirmed.
    pub fn time_to_live(self) -> Duration {
        match self {
            ElectionBehavior::Normal | ElectionBehavior::Manual => Duration::from_secs(5 * 60),
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => Duration::from_secs(30),
        }
    }

    /// Spacing between confirmation requests, in base latencies.
    pub fn confirm_req_factor(self) -> u32 {
        match self {
            ElectionBehavior::Normal | ElectionBehavior::Manual => 5,
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => 2,
        }
    }

    pub fn detail(self) -> DetailType {
        match self {
            ElectionBehavior::Normal => DetailType::Normal,
            ElectionBehavior::Hinted => DetailType::Hinted,
            ElectionBehavior::Optimistic => DetailType::Optimistic,
            ElectionBehavior::Manual => DetailType::Manual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speculative_behaviors_expire_sooner() {
        assert!(ElectionBehavior::Hinted.time_to_live() < ElectionBehavior::Normal.time_to_live());
        assert_eq!(
            ElectionBehavior::Optimistic.time_to_live(),
            Duration::from_secs(30)
        );
        assert_eq!(ElectionBehavior::Manual.time_to_live(), Duration::from_secs(300));
    }

    #[test]
    fn speculative_behaviors_request_more_often() {
        assert_eq!(ElectionBehavior::Normal.confirm_req_factor(), 5);
        assert_eq!(ElectionBehavior::Hinted.confirm_req_factor(), 2);
    }
}
