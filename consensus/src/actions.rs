//! Outbound effects of an election: what it asks the network, vote
//! generators and block processor to do.

use std::sync::{Arc, Mutex};

use orv_types::{Account, Block, BlockHash, QualifiedRoot, Root};

/// Collaborators an election drives. Implementations must not call back
/// into the election synchronously.
pub trait ElectionActions: Send + Sync {
    /// Flood the current winner to peers.
    fn broadcast_block(&self, block: &Arc<Block>);
    /// Generate and publish a vote from the local representatives.
    fn broadcast_vote(&self, root: &Root, hash: &BlockHash, is_final: bool);
    /// Ask representatives that have not voted yet to vote on `winner`.
    fn request_confirmation(&self, root: &QualifiedRoot, winner: &BlockHash);
    /// Push a new winner through the block processor, rolling back the old one.
    fn force_process(&self, block: &Arc<Block>);
    /// Representatives this node votes with.
    fn voting_representatives(&self) -> Vec<Account>;
}

/// A call recorded by [`NullElectionActions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedAction {
    BroadcastBlock(BlockHash),
    BroadcastVote { hash: BlockHash, is_final: bool },
    RequestConfirmation(BlockHash),
    ForceProcess(BlockHash),
}

/// Records every call instead of performing it.
#[derive(Default)]
pub struct NullElectionActions {
    recorded: Mutex<Vec<RecordedAction>>,
    voting_reps: Mutex<Vec<Account>>,
}

impl NullElectionActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voting_reps(reps: Vec<Account>) -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            voting_reps: Mutex::new(reps),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedAction> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, pred: impl Fn(&RecordedAction) -> bool) -> usize {
        self.recorded().iter().filter(|a| pred(a)).count()
    }

    pub fn clear(&self) {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, action: RecordedAction) {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }
}

impl ElectionActions for NullElectionActions {
    fn broadcast_block(&self, block: &Arc<Block>) {
        self.record(RecordedAction::BroadcastBlock(block.hash()));
    }

    fn broadcast_vote(&self, _root: &Root, hash: &BlockHash, is_final: bool) {
        self.record(RecordedAction::BroadcastVote {
            hash: *hash,
            is_final,
        });
    }

    fn request_confirmation(&self, _root: &QualifiedRoot, winner: &BlockHash) {
        self.record(RecordedAction::RequestConfirmation(*winner));
    }

    fn force_process(&self, block: &Arc<Block>) {
        self.record(RecordedAction::ForceProcess(block.hash()));
    }

    fn voting_representatives(&self) -> Vec<Account> {
        self.voting_reps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
