//! Consensus: fork resolution via Open Representative Voting (ORV).
//!
//! - Each account delegates its balance as weight to a representative.
//! - Representatives vote on competing blocks for the same root.
//! - A block is confirmed when its tally leads the runner-up by the quorum
//!   delta, a share (67% by default) of online voting weight.
//!
//! ## Module overview
//!
//! - [`election`]: per-root state machine (Passive -> Active -> Confirmed/Expired).
//! - [`active_elections`]: container that starts, routes votes to, and
//!   cleans up elections.
//! - [`online_reps`]: online and trended weight, quorum delta.
//! - [`vote_cache`]: votes that arrived before their election.
//! - [`actions`]: the outbound seam to network, vote generation and block
//!   processing.

pub mod actions;
pub mod active_elections;
pub mod behavior;
pub mod config;
pub mod election;
pub mod election_status;
pub mod error;
pub mod online_reps;
pub mod recently_cemented;
pub mod recently_confirmed;
pub mod vote_cache;
pub mod vote_info;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{ElectionActions, NullElectionActions, RecordedAction};
pub use active_elections::{ActiveElections, ActiveObservers, InsertResult};
pub use behavior::ElectionBehavior;
pub use config::{ActiveElectionsConfig, ElectionConfig, OnlineRepsConfig, VoteCacheConfig};
pub use election::{
    ConfirmationAction, Election, ElectionContext, ElectionState, LiveVoteAction, PublishResult,
    VoteOutcome, MAX_BLOCKS,
};
pub use election_status::{ElectionStatus, ElectionStatusType};
pub use error::ConsensusError;
pub use online_reps::OnlineReps;
pub use recently_cemented::RecentlyCemented;
pub use recently_confirmed::RecentlyConfirmed;
pub use vote_cache::{CachedVoteInfo, VoteCache};
pub use vote_info::{VoteCode, VoteInfo, VoteSource};
