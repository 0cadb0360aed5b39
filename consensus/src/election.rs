//! Election state machine: one consensus attempt for one qualified root.
//!
//! An election tracks up to [`MAX_BLOCKS`] competing candidate blocks and the
//! latest vote of each representative. It confirms a winner once the winner's
//! tally leads the runner-up by the quorum delta and, unless disabled, the
//! final votes for it reach the delta as well.
//!
//! The lifecycle is `Passive -> Active -> Confirmed -> ExpiredConfirmed`, with
//! `ExpiredUnconfirmed` reachable from `Passive` or `Active` on timeout or
//! cancellation. The state is an atomic that is only changed while the data
//! lock is held, so readers may observe it without locking.
//!
//! Every timer-driven method takes an explicit `now`. Side effects on other
//! components (broadcasts, vote generation, forced processing) are collected
//! while locked and performed after the lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use orv_ledger::Ledger;
use orv_types::{Account, Amount, Block, BlockHash, NetworkId, QualifiedRoot, Root, Vote};
use orv_utils::{DetailType, StatType, Stats};
use tracing::{debug, trace};

use crate::actions::ElectionActions;
use crate::behavior::ElectionBehavior;
use crate::config::ElectionConfig;
use crate::election_status::{ElectionStatus, ElectionStatusType};
use crate::online_reps::OnlineReps;
use crate::vote_info::{VoteCode, VoteInfo, VoteSource};

/// Maximum number of candidate blocks tracked per election.
pub const MAX_BLOCKS: usize = 10;

/// The lifecycle state of an election.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElectionState {
    /// Waiting for votes; no requests are sent yet.
    Passive = 0,
    /// Soliciting votes and rebroadcasting the winner.
    Active = 1,
    /// Winner fixed; cleaned up on the next tick.
    Confirmed = 2,
    ExpiredConfirmed = 3,
    ExpiredUnconfirmed = 4,
}

impl ElectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ElectionState::Passive,
            1 => ElectionState::Active,
            2 => ElectionState::Confirmed,
            3 => ElectionState::ExpiredConfirmed,
            _ => ElectionState::ExpiredUnconfirmed,
        }
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    pub fn can_transition_to(self, next: ElectionState) -> bool {
        use ElectionState::*;
        matches!(
            (self, next),
            (Passive, Active)
                | (Passive, Confirmed)
                | (Passive, ExpiredUnconfirmed)
                | (Active, Confirmed)
                | (Active, ExpiredUnconfirmed)
                | (Confirmed, ExpiredConfirmed)
        )
    }

    pub fn is_confirmed(self) -> bool {
        matches!(self, ElectionState::Confirmed | ElectionState::ExpiredConfirmed)
    }
}

/// Shared dependencies handed to every election.
pub struct ElectionContext {
    pub ledger: Arc<Ledger>,
    pub online_reps: Arc<OnlineReps>,
    pub actions: Arc<dyn ElectionActions>,
    pub stats: Arc<Stats>,
    pub network: NetworkId,
    pub config: ElectionConfig,
}

impl ElectionContext {
    fn base_latency(&self) -> Duration {
        self.network.base_latency()
    }

    fn voting_enabled(&self) -> bool {
        self.config.enable_voting && !self.actions.voting_representatives().is_empty()
    }
}

pub type ConfirmationAction = Arc<dyn Fn(&Arc<Block>) + Send + Sync>;
pub type LiveVoteAction = Arc<dyn Fn(&Account) + Send + Sync>;

/// Result of [`Election::vote`]. `confirmed` carries the status when this
/// vote confirmed the election.
#[derive(Clone, Debug)]
pub struct VoteOutcome {
    pub code: VoteCode,
    pub confirmed: Option<ElectionStatus>,
}

impl VoteOutcome {
    fn code(code: VoteCode) -> Self {
        Self {
            code,
            confirmed: None,
        }
    }
}

/// Result of [`Election::publish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishResult {
    /// New candidate added.
    Added,
    /// New candidate added after evicting the given candidate.
    Replaced(BlockHash),
    /// Already a candidate; its contents were refreshed.
    Updated,
    /// Election finished, or no room and not enough cached weight.
    Rejected,
}

struct ElectionData {
    status: ElectionStatus,
    last_blocks: HashMap<BlockHash, Arc<Block>>,
    last_votes: HashMap<Account, VoteInfo>,
    last_tally: HashMap<BlockHash, Amount>,
    final_weight: Amount,
    state_start: Instant,
    last_block: Option<(Instant, BlockHash)>,
    last_req: Option<Instant>,
    last_vote: Option<Instant>,
    confirmation_request_count: u32,
}

/// Work to do on other components once the data lock is released.
#[derive(Default)]
struct Effects {
    broadcast_block: Option<Arc<Block>>,
    vote: Option<(BlockHash, bool)>,
    request_confirmation: Option<BlockHash>,
    force_process: Option<Arc<Block>>,
    live_vote: Option<Account>,
}

pub struct Election {
    id: u64,
    qualified_root: QualifiedRoot,
    behavior: ElectionBehavior,
    started: Instant,
    state: AtomicU8,
    is_quorum: AtomicBool,
    data: Mutex<ElectionData>,
    ctx: Arc<ElectionContext>,
    confirmation_action: Option<ConfirmationAction>,
    live_vote_action: Option<LiveVoteAction>,
}

impl Election {
    /// Create a passive election with `block` as its only candidate and
    /// initial winner.
    pub fn new(
        id: u64,
        block: Arc<Block>,
        behavior: ElectionBehavior,
        ctx: Arc<ElectionContext>,
        now: Instant,
    ) -> Self {
        let mut last_blocks = HashMap::new();
        last_blocks.insert(block.hash(), Arc::clone(&block));
        Self {
            id,
            qualified_root: block.qualified_root(),
            behavior,
            started: now,
            state: AtomicU8::new(ElectionState::Passive as u8),
            is_quorum: AtomicBool::new(false),
            data: Mutex::new(ElectionData {
                status: ElectionStatus::new(block, SystemTime::now()),
                last_blocks,
                last_votes: HashMap::new(),
                last_tally: HashMap::new(),
                final_weight: Amount::ZERO,
                state_start: now,
                last_block: None,
                last_req: None,
                last_vote: None,
                confirmation_request_count: 0,
            }),
            ctx,
            confirmation_action: None,
            live_vote_action: None,
        }
    }

    /// Run `action` with the winner after this election confirms.
    pub fn with_confirmation_action(mut self, action: ConfirmationAction) -> Self {
        self.confirmation_action = Some(action);
        self
    }

    /// Run `action` with the voter whenever a live vote is accepted.
    pub fn with_live_vote_action(mut self, action: LiveVoteAction) -> Self {
        self.live_vote_action = Some(action);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ElectionData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        self.qualified_root
    }

    pub fn root(&self) -> Root {
        self.qualified_root.root
    }

    pub fn behavior(&self) -> ElectionBehavior {
        self.behavior
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn state(&self) -> ElectionState {
        ElectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn confirmed(&self) -> bool {
        self.state().is_confirmed()
    }

    pub fn failed(&self) -> bool {
        self.state() == ElectionState::ExpiredUnconfirmed
    }

    pub fn is_quorum(&self) -> bool {
        self.is_quorum.load(Ordering::SeqCst)
    }

    pub fn confirmation_action(&self) -> Option<ConfirmationAction> {
        self.confirmation_action.clone()
    }

    pub fn time_to_live(&self) -> Duration {
        self.behavior.time_to_live()
    }

    pub fn confirm_req_time(&self) -> Duration {
        self.ctx.base_latency() * self.behavior.confirm_req_factor()
    }

    fn passive_duration(&self) -> Duration {
        self.ctx.base_latency() * self.ctx.config.passive_duration_factor
    }

    /// Minimum spacing between vote changes by a representative of `weight`.
    pub fn cooldown_time(&self, weight: Amount) -> Duration {
        let trended = self.ctx.online_reps.trended().number();
        let weight = weight.number();
        if weight > trended / 20 {
            Duration::from_secs(1)
        } else if weight > trended / 100 {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(15)
        }
    }

    /// Must be called with the data lock held; `data` is the proof.
    fn state_change(
        &self,
        data: &mut ElectionData,
        expected: ElectionState,
        desired: ElectionState,
        now: Instant,
    ) -> bool {
        if !expected.can_transition_to(desired) {
            return false;
        }
        let changed = self
            .state
            .compare_exchange(
                expected as u8,
                desired as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if changed {
            data.state_start = now;
            trace!(id = self.id, from = ?expected, to = ?desired, "election state changed");
        }
        changed
    }

    /// Skip the rest of the passive phase.
    pub fn transition_active(&self, now: Instant) -> bool {
        let mut data = self.lock();
        self.state_change(&mut data, ElectionState::Passive, ElectionState::Active, now)
    }

    /// Process one representative's vote for `hash`.
    ///
    /// A vote not newer than the recorded one is a replay, so a final vote
    /// can never be replaced. A newer vote inside the representative's
    /// cooldown is ignored unless it upgrades to final or came from the vote
    /// cache.
    pub fn vote(
        &self,
        rep: &Account,
        timestamp: u64,
        hash: &BlockHash,
        source: VoteSource,
        now: Instant,
    ) -> VoteOutcome {
        let weight = self.ctx.ledger.weight(rep);
        if !self.ctx.network.is_dev() && weight <= self.ctx.online_reps.minimum_principal_weight()
        {
            return VoteOutcome::code(VoteCode::Indeterminate);
        }

        let mut effects = Effects::default();
        let confirmed = {
            let mut data = self.lock();
            if let Some(last) = data.last_votes.get(rep) {
                if last.timestamp >= timestamp {
                    return VoteOutcome::code(VoteCode::Replay);
                }
                let upgrades_to_final = timestamp == Vote::FINAL_TIMESTAMP;
                let past_cooldown = source == VoteSource::Cache
                    || now.saturating_duration_since(last.time) >= self.cooldown_time(weight);
                if !upgrades_to_final && !past_cooldown {
                    return VoteOutcome::code(VoteCode::Ignored);
                }
            }
            data.last_votes
                .insert(*rep, VoteInfo::new(now, timestamp, *hash));
            if source == VoteSource::Live {
                effects.live_vote = Some(*rep);
            }
            trace!(
                id = self.id,
                rep = %rep,
                hash = %hash,
                timestamp,
                ?source,
                "vote recorded"
            );
            if self.confirmed() {
                None
            } else {
                self.confirm_if_quorum(&mut data, &mut effects, now)
            }
        };

        self.ctx.stats.inc(StatType::Election, source.detail());
        self.apply(effects);
        VoteOutcome {
            code: VoteCode::Vote,
            confirmed,
        }
    }

    /// Tally of known candidates, heaviest first. Refreshes the cached
    /// per-block tally and the final weight of the leader.
    fn tally_impl(&self, data: &mut ElectionData) -> Vec<(Amount, BlockHash)> {
        let mut block_weights: HashMap<BlockHash, Amount> = HashMap::new();
        let mut final_weights: HashMap<BlockHash, Amount> = HashMap::new();
        for (rep, info) in &data.last_votes {
            let weight = self.ctx.ledger.weight(rep);
            *block_weights.entry(info.hash).or_default() += weight;
            if info.is_final() {
                *final_weights.entry(info.hash).or_default() += weight;
            }
        }

        let mut result: Vec<(Amount, BlockHash)> = block_weights
            .iter()
            .filter(|(hash, _)| data.last_blocks.contains_key(hash))
            .map(|(hash, weight)| (*weight, *hash))
            .collect();
        result.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        data.final_weight = result
            .first()
            .and_then(|(_, hash)| final_weights.get(hash).copied())
            .unwrap_or_default();
        data.last_tally = block_weights;
        result
    }

    fn have_quorum(tally: &[(Amount, BlockHash)], delta: Amount) -> bool {
        let Some((first, _)) = tally.first() else {
            return false;
        };
        let second = tally.get(1).map(|(w, _)| *w).unwrap_or_default();
        first.saturating_sub(second) >= delta
    }

    fn confirm_if_quorum(
        &self,
        data: &mut ElectionData,
        effects: &mut Effects,
        now: Instant,
    ) -> Option<ElectionStatus> {
        let tally = self.tally_impl(data);
        let &(leader_weight, leader_hash) = tally.first()?;
        data.status.tally = leader_weight;
        data.status.final_tally = data.final_weight;

        let delta = self.ctx.online_reps.delta();
        let winner_hash = data.status.winner.hash();
        if leader_hash != winner_hash && leader_weight >= delta {
            if let Some(block) = data.last_blocks.get(&leader_hash).cloned() {
                debug!(
                    id = self.id,
                    old = %winner_hash,
                    new = %leader_hash,
                    "election winner switched"
                );
                data.status.winner = Arc::clone(&block);
                self.remove_votes(data, &winner_hash);
                effects.force_process = Some(block);
                self.ctx
                    .stats
                    .inc(StatType::Election, DetailType::WinnerSwitched);
            }
        }

        if Self::have_quorum(&tally, delta) {
            if !self.is_quorum.swap(true, Ordering::SeqCst) && self.ctx.voting_enabled() {
                effects.vote = Some((data.status.winner.hash(), true));
            }
            if !self.ctx.config.require_final_votes || data.final_weight >= delta {
                return self.confirm_once(data, ElectionStatusType::ActiveConfirmedQuorum, now);
            }
        }
        None
    }

    /// Our own representatives' votes for a displaced winner no longer
    /// reflect what we would vote.
    fn remove_votes(&self, data: &mut ElectionData, old_winner: &BlockHash) {
        if !self.ctx.voting_enabled() {
            return;
        }
        for rep in self.ctx.actions.voting_representatives() {
            if data.last_votes.get(&rep).is_some_and(|v| v.hash == *old_winner) {
                data.last_votes.remove(&rep);
            }
        }
    }

    fn confirm_once(
        &self,
        data: &mut ElectionData,
        status_type: ElectionStatusType,
        now: Instant,
    ) -> Option<ElectionStatus> {
        let current = self.state();
        if !self.state_change(data, current, ElectionState::Confirmed, now) {
            return None;
        }
        data.status.status_type = status_type;
        data.status.election_end = Some(SystemTime::now());
        data.status.election_duration = now.saturating_duration_since(self.started);
        data.status.confirmation_request_count = data.confirmation_request_count;
        data.status.block_count = data.last_blocks.len() as u32;
        data.status.voter_count = data.last_votes.len() as u32;
        debug!(
            id = self.id,
            winner = %data.status.winner.hash(),
            tally = %data.status.tally,
            final_tally = %data.status.final_tally,
            ?status_type,
            "election confirmed"
        );
        Some(data.status.clone())
    }

    /// Confirm because cementing reached `hash`, if it is the winner.
    pub fn try_confirm(&self, hash: &BlockHash, now: Instant) -> Option<ElectionStatus> {
        let mut data = self.lock();
        if data.status.winner.hash() != *hash || self.confirmed() {
            return None;
        }
        self.confirm_once(&mut data, ElectionStatusType::ActiveConfirmationHeight, now)
    }

    /// Confirm the current winner regardless of votes.
    pub fn force_confirm(&self, now: Instant) -> Option<ElectionStatus> {
        let mut data = self.lock();
        self.confirm_once(&mut data, ElectionStatusType::ActiveConfirmedQuorum, now)
    }

    /// Stop an unconfirmed election. Returns false if it already finished.
    #[cfg(test)]
    pub(crate) fn state_start(&self) -> Instant {
        self.lock().state_start
    }

    pub fn cancel(&self, now: Instant) -> bool {
        let mut data = self.lock();
        let current = self.state();
        let cancelled = self.state_change(&mut data, current, ElectionState::ExpiredUnconfirmed, now);
        if cancelled {
            data.status.status_type = ElectionStatusType::Stopped;
        }
        cancelled
    }

    /// Advance timers. Returns true when the election should be removed
    /// from the container.
    pub fn transition_time(&self, now: Instant) -> bool {
        let mut effects = Effects::default();
        let cleanup = {
            let mut data = self.lock();
            let mut cleanup = false;
            match self.state() {
                ElectionState::Passive => {
                    if now.saturating_duration_since(data.state_start) > self.passive_duration() {
                        self.state_change(
                            &mut data,
                            ElectionState::Passive,
                            ElectionState::Active,
                            now,
                        );
                    }
                }
                ElectionState::Active => {
                    self.broadcast_vote_locked(&mut data, &mut effects, now);
                    self.broadcast_block_locked(&mut data, &mut effects, now);
                    self.send_confirm_req(&mut data, &mut effects, now);
                }
                ElectionState::Confirmed => {
                    cleanup = true;
                    self.broadcast_block_locked(&mut data, &mut effects, now);
                    self.state_change(
                        &mut data,
                        ElectionState::Confirmed,
                        ElectionState::ExpiredConfirmed,
                        now,
                    );
                }
                ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => {
                    cleanup = true;
                }
            }

            if !self.confirmed()
                && now.saturating_duration_since(self.started) > self.time_to_live()
            {
                let current = self.state();
                if self.state_change(&mut data, current, ElectionState::ExpiredUnconfirmed, now) {
                    debug!(id = self.id, root = %self.qualified_root, "election expired");
                    data.status.status_type = ElectionStatusType::Stopped;
                    cleanup = true;
                }
            }
            cleanup
        };
        self.apply(effects);
        cleanup
    }

    /// Generate a vote for the current winner if the vote interval allows.
    pub fn broadcast_vote(&self, now: Instant) {
        let mut effects = Effects::default();
        {
            let mut data = self.lock();
            self.broadcast_vote_locked(&mut data, &mut effects, now);
        }
        self.apply(effects);
    }

    fn broadcast_vote_locked(&self, data: &mut ElectionData, effects: &mut Effects, now: Instant) {
        let interval = Duration::from_millis(self.ctx.config.vote_broadcast_interval_ms);
        if data.last_vote.is_some_and(|last| now < last + interval) {
            return;
        }
        data.last_vote = Some(now);
        if !self.ctx.voting_enabled() {
            return;
        }
        let is_final = self.confirmed() || {
            let tally = self.tally_impl(data);
            Self::have_quorum(&tally, self.ctx.online_reps.delta())
        };
        effects.vote = Some((data.status.winner.hash(), is_final));
    }

    fn broadcast_block_locked(&self, data: &mut ElectionData, effects: &mut Effects, now: Instant) {
        let winner = data.status.winner.hash();
        let interval = Duration::from_millis(self.ctx.config.block_broadcast_interval_ms);
        let due = match data.last_block {
            None => true,
            Some((at, hash)) => hash != winner || now.saturating_duration_since(at) >= interval,
        };
        if due {
            data.last_block = Some((now, winner));
            effects.broadcast_block = Some(Arc::clone(&data.status.winner));
        }
    }

    fn send_confirm_req(&self, data: &mut ElectionData, effects: &mut Effects, now: Instant) {
        let due = data
            .last_req
            .map_or(true, |at| now.saturating_duration_since(at) > self.confirm_req_time());
        if due {
            data.last_req = Some(now);
            data.confirmation_request_count += 1;
            effects.request_confirmation = Some(data.status.winner.hash());
        }
    }

    fn apply(&self, effects: Effects) {
        let actions = &self.ctx.actions;
        let stats = &self.ctx.stats;
        if let Some(block) = effects.force_process {
            actions.force_process(&block);
        }
        if let Some((hash, is_final)) = effects.vote {
            stats.inc(
                StatType::Election,
                if is_final {
                    DetailType::GenerateFinalVote
                } else {
                    DetailType::BroadcastVote
                },
            );
            actions.broadcast_vote(&self.root(), &hash, is_final);
        }
        if let Some(block) = effects.broadcast_block {
            stats.inc(StatType::Election, DetailType::BroadcastBlock);
            actions.broadcast_block(&block);
        }
        if let Some(hash) = effects.request_confirmation {
            stats.inc(StatType::Election, DetailType::ConfirmationRequest);
            actions.request_confirmation(&self.qualified_root, &hash);
        }
        if let (Some(rep), Some(action)) = (effects.live_vote, &self.live_vote_action) {
            action(&rep);
        }
    }

    /// Offer a candidate block. `inactive_tally` is the weight the vote
    /// cache holds for it, used to decide whether it may displace an
    /// existing candidate when the set is full.
    pub fn publish(&self, block: Arc<Block>, inactive_tally: Amount) -> PublishResult {
        let mut effects = Effects::default();
        let result = {
            let mut data = self.lock();
            if self.confirmed() || self.failed() {
                return PublishResult::Rejected;
            }
            let hash = block.hash();
            if let Some(existing) = data.last_blocks.get_mut(&hash) {
                *existing = Arc::clone(&block);
                if data.status.winner.hash() == hash {
                    data.status.winner = Arc::clone(&block);
                    effects.broadcast_block = Some(block);
                }
                PublishResult::Updated
            } else if data.last_blocks.len() >= MAX_BLOCKS {
                match Self::replace_by_weight(&data, inactive_tally) {
                    Some(evicted) => {
                        data.last_blocks.remove(&evicted);
                        data.last_blocks.insert(hash, block);
                        debug!(id = self.id, %evicted, added = %hash, "fork candidate replaced");
                        PublishResult::Replaced(evicted)
                    }
                    None => PublishResult::Rejected,
                }
            } else {
                data.last_blocks.insert(hash, block);
                PublishResult::Added
            }
        };
        self.apply(effects);
        result
    }

    /// Pick a candidate to evict in favour of a block with `inactive_tally`
    /// cached weight. The winner is never evicted.
    fn replace_by_weight(data: &ElectionData, inactive_tally: Amount) -> Option<BlockHash> {
        if inactive_tally.is_zero() {
            return None;
        }
        let winner = data.status.winner.hash();
        let mut sorted: Vec<(BlockHash, Amount)> = data
            .last_tally
            .iter()
            .filter(|(hash, _)| data.last_blocks.contains_key(hash))
            .map(|(hash, weight)| (*hash, *weight))
            .collect();
        sorted.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

        if sorted.len() < MAX_BLOCKS {
            return data
                .last_blocks
                .keys()
                .filter(|hash| **hash != winner && !sorted.iter().any(|(h, _)| h == *hash))
                .min()
                .copied();
        }
        let (lowest, lowest_weight) = sorted[0];
        if inactive_tally <= lowest_weight {
            None
        } else if lowest != winner {
            Some(lowest)
        } else {
            let (second, second_weight) = sorted[1];
            (inactive_tally > second_weight).then_some(second)
        }
    }

    /// After confirmation, drop every candidate except the winner and
    /// return the dropped hashes.
    pub fn drop_losing_candidates(&self) -> Vec<BlockHash> {
        let mut data = self.lock();
        if !self.confirmed() {
            return Vec::new();
        }
        let winner = data.status.winner.hash();
        let losers: Vec<BlockHash> = data
            .last_blocks
            .keys()
            .filter(|hash| **hash != winner)
            .copied()
            .collect();
        data.last_blocks.retain(|hash, _| *hash == winner);
        losers
    }

    /// Status snapshot with live counters filled in.
    pub fn current_status(&self) -> ElectionStatus {
        let data = self.lock();
        let mut status = data.status.clone();
        status.confirmation_request_count = data.confirmation_request_count;
        status.block_count = data.last_blocks.len() as u32;
        status.voter_count = data.last_votes.len() as u32;
        status
    }

    pub fn winner(&self) -> Arc<Block> {
        Arc::clone(&self.lock().status.winner)
    }

    /// Candidates ranked by voting weight, heaviest first.
    pub fn tally(&self) -> Vec<(Amount, BlockHash)> {
        let mut data = self.lock();
        self.tally_impl(&mut data)
    }

    pub fn votes(&self) -> HashMap<Account, VoteInfo> {
        self.lock().last_votes.clone()
    }

    pub fn blocks(&self) -> HashMap<BlockHash, Arc<Block>> {
        self.lock().last_blocks.clone()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.lock().last_blocks.contains_key(hash)
    }

    pub fn duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

impl std::fmt::Debug for Election {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Election")
            .field("id", &self.id)
            .field("root", &self.qualified_root)
            .field("behavior", &self.behavior)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{NullElectionActions, RecordedAction};
    use crate::testing::{context, fork, quorum_context, rep, TestContext};
    use proptest::prelude::*;

    fn election(fx: &TestContext, block: &Arc<Block>) -> Election {
        Election::new(
            1,
            Arc::clone(block),
            ElectionBehavior::Normal,
            Arc::clone(&fx.ctx),
            fx.clock.now(),
        )
    }

    #[test]
    fn starts_passive_with_single_candidate() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        assert_eq!(e.state(), ElectionState::Passive);
        assert_eq!(e.winner().hash(), b1.hash());
        assert_eq!(e.blocks().len(), 1);
        assert_eq!(e.current_status().status_type, ElectionStatusType::Ongoing);
    }

    #[test]
    fn split_vote_then_switch_confirms_b1() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let e = election(&fx, &b1);
        assert_eq!(e.publish(Arc::clone(&b2), Amount::ZERO), PublishResult::Added);
        let now = fx.clock.now();

        assert_eq!(e.vote(&rep(1), 1, &b1.hash(), VoteSource::Live, now).code, VoteCode::Vote);
        assert_eq!(e.vote(&rep(2), 1, &b2.hash(), VoteSource::Live, now).code, VoteCode::Vote);
        // 25% undecided: 40 vs 35 is far short of a 67 raw gap
        assert!(!e.confirmed());

        let outcome = e.vote(&rep(3), 1, &b1.hash(), VoteSource::Live, now);
        assert!(outcome.confirmed.is_none());

        fx.clock.advance(Duration::from_secs(2));
        let outcome = e.vote(&rep(2), 2, &b1.hash(), VoteSource::Live, fx.clock.now());
        assert_eq!(outcome.code, VoteCode::Vote);
        let status = outcome.confirmed.expect("quorum reached");
        assert_eq!(status.winner.hash(), b1.hash());
        assert_eq!(status.tally, Amount::raw(100));
        assert_eq!(status.status_type, ElectionStatusType::ActiveConfirmedQuorum);
        assert_eq!(status.block_count, 2);
        assert_eq!(status.voter_count, 3);
        assert!(e.confirmed());
        assert_eq!(e.drop_losing_candidates(), vec![b2.hash()]);
        assert_eq!(e.blocks().len(), 1);
    }

    #[test]
    fn replay_and_cooldown() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let e = election(&fx, &b1);
        e.publish(Arc::clone(&b2), Amount::ZERO);
        let now = fx.clock.now();

        e.vote(&rep(3), 10, &b1.hash(), VoteSource::Live, now);
        assert_eq!(e.vote(&rep(3), 9, &b2.hash(), VoteSource::Live, now).code, VoteCode::Replay);
        assert_eq!(e.vote(&rep(3), 10, &b1.hash(), VoteSource::Live, now).code, VoteCode::Replay);
        // newer, but within the 1s cooldown of a heavy rep
        assert_eq!(e.vote(&rep(3), 11, &b2.hash(), VoteSource::Live, now).code, VoteCode::Ignored);
        // cached votes bypass the cooldown
        assert_eq!(e.vote(&rep(3), 11, &b2.hash(), VoteSource::Cache, now).code, VoteCode::Vote);
        assert_eq!(e.votes()[&rep(3)].hash, b2.hash());
    }

    #[test]
    fn equal_timestamp_is_a_replay_for_any_hash() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let (low, high) = if b1.hash() < b2.hash() { (b1, b2) } else { (b2, b1) };
        let e = election(&fx, &low);
        e.publish(Arc::clone(&high), Amount::ZERO);
        let now = fx.clock.now();
        e.vote(&rep(3), 5, &low.hash(), VoteSource::Cache, now);
        assert_eq!(e.vote(&rep(3), 5, &high.hash(), VoteSource::Cache, now).code, VoteCode::Replay);
        assert_eq!(e.vote(&rep(3), 5, &low.hash(), VoteSource::Cache, now).code, VoteCode::Replay);
        assert_eq!(e.votes()[&rep(3)].hash, low.hash());
    }

    #[test]
    fn final_vote_cannot_move_to_another_block() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let e = election(&fx, &b1);
        e.publish(Arc::clone(&b2), Amount::ZERO);
        let now = fx.clock.now();
        e.vote(&rep(1), Vote::FINAL_TIMESTAMP, &b1.hash(), VoteSource::Live, now);
        let later = now + Duration::from_secs(60);
        let code = e.vote(&rep(1), Vote::FINAL_TIMESTAMP, &b2.hash(), VoteSource::Live, later).code;
        assert_eq!(code, VoteCode::Replay);
        assert_eq!(e.votes()[&rep(1)].hash, b1.hash());
    }

    #[test]
    fn lighter_reps_wait_longer_between_votes() {
        let fx = quorum_context();
        // against the 100 raw trended floor: 3 raw is 3%, 1 raw is 1%
        fx.ctx.ledger.rep_weights().add(&rep(5), Amount::raw(3));
        fx.ctx.ledger.rep_weights().add(&rep(6), Amount::raw(1));
        let (b1, b2) = (fork(1), fork(2));

        for (voter, secs) in [(rep(5), 5), (rep(6), 15)] {
            let e = election(&fx, &b1);
            e.publish(Arc::clone(&b2), Amount::ZERO);
            let weight = fx.ctx.ledger.weight(&voter);
            assert_eq!(e.cooldown_time(weight), Duration::from_secs(secs));

            let start = fx.clock.now();
            assert_eq!(e.vote(&voter, 1, &b1.hash(), VoteSource::Live, start).code, VoteCode::Vote);
            let early = start + Duration::from_secs(secs - 1);
            assert_eq!(e.vote(&voter, 2, &b2.hash(), VoteSource::Live, early).code, VoteCode::Ignored);
            assert_eq!(e.votes()[&voter].hash, b1.hash());

            let due = start + Duration::from_secs(secs);
            assert_eq!(e.vote(&voter, 3, &b2.hash(), VoteSource::Live, due).code, VoteCode::Vote);
            assert_eq!(e.votes()[&voter].hash, b2.hash());
        }
    }

    #[test]
    fn final_upgrade_bypasses_cooldown() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        let now = fx.clock.now();
        e.vote(&rep(3), 1, &b1.hash(), VoteSource::Live, now);
        let outcome = e.vote(&rep(3), Vote::FINAL_TIMESTAMP, &b1.hash(), VoteSource::Live, now);
        assert_eq!(outcome.code, VoteCode::Vote);
        assert!(e.votes()[&rep(3)].is_final());
    }

    #[test]
    fn final_votes_gate_confirmation() {
        let fx = context(ElectionConfig::default(), NullElectionActions::new());
        let b1 = fork(1);
        let e = election(&fx, &b1);
        let now = fx.clock.now();
        let outcome = e.vote(&rep(4), 1, &b1.hash(), VoteSource::Live, now);
        // 70 raw leads by more than delta, but no final votes yet
        assert!(outcome.confirmed.is_none());
        assert!(e.is_quorum());
        let outcome = e.vote(&rep(4), Vote::FINAL_TIMESTAMP, &b1.hash(), VoteSource::Live, now);
        let status = outcome.confirmed.expect("final quorum");
        assert_eq!(status.final_tally, Amount::raw(70));
    }

    #[test]
    fn single_final_vote_from_majority_rep_confirms_and_votes_final() {
        let fx = context(
            ElectionConfig {
                enable_voting: true,
                ..Default::default()
            },
            NullElectionActions::with_voting_reps(vec![rep(9)]),
        );
        let b1 = fork(1);
        let e = election(&fx, &b1);
        let outcome = e.vote(
            &rep(4),
            Vote::FINAL_TIMESTAMP,
            &b1.hash(),
            VoteSource::Live,
            fx.clock.now(),
        );
        assert!(outcome.confirmed.is_some());
        assert!(fx.actions.recorded().contains(&RecordedAction::BroadcastVote {
            hash: b1.hash(),
            is_final: true
        }));
        assert!(e.vote(&rep(1), 1, &b1.hash(), VoteSource::Live, fx.clock.now()).confirmed.is_none());
    }

    #[test]
    fn winner_switch_forces_processing() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let e = election(&fx, &b1);
        e.publish(Arc::clone(&b2), Amount::ZERO);
        let outcome = e.vote(&rep(4), 1, &b2.hash(), VoteSource::Live, fx.clock.now());
        assert!(outcome.confirmed.is_some());
        assert_eq!(e.winner().hash(), b2.hash());
        assert!(fx
            .actions
            .recorded()
            .contains(&RecordedAction::ForceProcess(b2.hash())));
    }

    #[test]
    fn passive_becomes_active_then_solicits() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        assert!(!e.transition_time(fx.clock.now()));
        assert_eq!(e.state(), ElectionState::Passive);

        // dev base latency is 25ms, passive lasts five of them
        fx.clock.advance(Duration::from_millis(130));
        e.transition_time(fx.clock.now());
        assert_eq!(e.state(), ElectionState::Active);

        e.transition_time(fx.clock.now());
        let recorded = fx.actions.recorded();
        assert!(recorded.contains(&RecordedAction::BroadcastBlock(b1.hash())));
        assert!(recorded.contains(&RecordedAction::RequestConfirmation(b1.hash())));
        assert_eq!(e.current_status().confirmation_request_count, 1);

        // requests are spaced by five base latencies
        e.transition_time(fx.clock.now());
        assert_eq!(e.current_status().confirmation_request_count, 1);
        fx.clock.advance(Duration::from_millis(130));
        e.transition_time(fx.clock.now());
        assert_eq!(e.current_status().confirmation_request_count, 2);
    }

    #[test]
    fn confirmed_election_is_cleaned_up_on_next_tick() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        assert!(e.force_confirm(fx.clock.now()).is_some());
        assert!(e.force_confirm(fx.clock.now()).is_none());
        assert!(e.transition_time(fx.clock.now()));
        assert_eq!(e.state(), ElectionState::ExpiredConfirmed);
    }

    #[test]
    fn unconfirmed_election_expires_after_ttl() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        fx.clock.advance(Duration::from_secs(301));
        assert!(e.transition_time(fx.clock.now()));
        assert!(e.failed());
        assert_eq!(e.current_status().status_type, ElectionStatusType::Stopped);
        assert!(e.try_confirm(&b1.hash(), fx.clock.now()).is_none());
    }

    #[test]
    fn try_confirm_only_matches_winner() {
        let fx = quorum_context();
        let (b1, b2) = (fork(1), fork(2));
        let e = election(&fx, &b1);
        e.publish(Arc::clone(&b2), Amount::ZERO);
        assert!(e.try_confirm(&b2.hash(), fx.clock.now()).is_none());
        let status = e.try_confirm(&b1.hash(), fx.clock.now()).unwrap();
        assert_eq!(status.status_type, ElectionStatusType::ActiveConfirmationHeight);
    }

    #[test]
    fn cancel_stops_unconfirmed_only() {
        let fx = quorum_context();
        let e = election(&fx, &fork(1));
        assert!(e.cancel(fx.clock.now()));
        assert!(!e.cancel(fx.clock.now()));
        let e = election(&fx, &fork(2));
        e.force_confirm(fx.clock.now());
        assert!(!e.cancel(fx.clock.now()));
    }

    #[test]
    fn publish_after_confirmation_is_rejected() {
        let fx = quorum_context();
        let e = election(&fx, &fork(1));
        e.force_confirm(fx.clock.now());
        assert_eq!(e.publish(fork(2), Amount::raw(1000)), PublishResult::Rejected);
    }

    #[test]
    fn full_candidate_set_needs_cached_weight_to_replace() {
        let fx = quorum_context();
        let b1 = fork(1);
        let e = election(&fx, &b1);
        for n in 2..=MAX_BLOCKS as u64 {
            assert_eq!(e.publish(fork(n), Amount::ZERO), PublishResult::Added);
        }
        assert_eq!(e.publish(fork(50), Amount::ZERO), PublishResult::Rejected);
        match e.publish(fork(51), Amount::raw(5)) {
            PublishResult::Replaced(evicted) => assert_ne!(evicted, b1.hash()),
            other => panic!("expected replacement, got {other:?}"),
        }
        assert_eq!(e.blocks().len(), MAX_BLOCKS);
        assert!(e.contains(&b1.hash()));
    }

    #[test]
    fn legal_transitions_only() {
        use ElectionState::*;
        let all = [Passive, Active, Confirmed, ExpiredConfirmed, ExpiredUnconfirmed];
        for from in all {
            for to in all {
                let legal = from.can_transition_to(to);
                let expected = matches!(
                    (from, to),
                    (Passive, Active)
                        | (Passive, Confirmed)
                        | (Passive, ExpiredUnconfirmed)
                        | (Active, Confirmed)
                        | (Active, ExpiredUnconfirmed)
                        | (Confirmed, ExpiredConfirmed)
                );
                assert_eq!(legal, expected, "{from:?} -> {to:?}");
            }
        }
    }

    proptest! {
        #[test]
        fn stale_votes_are_replays(
            t1 in 1u64..1_000,
            back in 0u64..1_000,
            first in 1u64..=3,
            second in 1u64..=3,
            first_is_final in any::<bool>(),
        ) {
            let fx = quorum_context();
            let e = election(&fx, &fork(1));
            e.publish(fork(2), Amount::ZERO);
            e.publish(fork(3), Amount::ZERO);
            let t1 = if first_is_final { Vote::FINAL_TIMESTAMP } else { t1 };
            let t2 = t1.saturating_sub(back);
            let now = fx.clock.now();
            let later = now + Duration::from_secs(60);

            prop_assert_eq!(e.vote(&rep(1), t1, &fork(first).hash(), VoteSource::Live, now).code, VoteCode::Vote);
            prop_assert_eq!(e.vote(&rep(1), t2, &fork(second).hash(), VoteSource::Live, later).code, VoteCode::Replay);
            prop_assert_eq!(e.votes()[&rep(1)].timestamp, t1);
            prop_assert_eq!(e.votes()[&rep(1)].hash, fork(first).hash());

            // only an upgrade to final gets past a recorded vote
            let upgrade = e.vote(&rep(1), Vote::FINAL_TIMESTAMP, &fork(second).hash(), VoteSource::Live, later).code;
            let expected = if first_is_final { VoteCode::Replay } else { VoteCode::Vote };
            prop_assert_eq!(upgrade, expected);
        }

        #[test]
        fn confirmed_winner_never_changes(
            votes in proptest::collection::vec((1u64..=4, 1u64..=3, 1u64..100, any::<bool>()), 1..40),
        ) {
            let fx = quorum_context();
            let e = election(&fx, &fork(1));
            e.publish(fork(2), Amount::ZERO);
            e.publish(fork(3), Amount::ZERO);
            let mut now = fx.clock.now();
            let mut winner: Option<BlockHash> = None;
            for (voter, block, timestamp, is_final) in votes {
                // past every cooldown the test reps are subject to
                now += Duration::from_secs(2);
                let timestamp = if is_final { Vote::FINAL_TIMESTAMP } else { timestamp };
                e.vote(&rep(voter), timestamp, &fork(block).hash(), VoteSource::Live, now);
                match winner {
                    Some(hash) => {
                        prop_assert!(e.confirmed());
                        prop_assert_eq!(e.winner().hash(), hash);
                    }
                    None if e.confirmed() => winner = Some(e.winner().hash()),
                    None => {}
                }
            }
        }

        #[test]
        fn candidate_set_never_exceeds_bound(tallies in proptest::collection::vec(0u128..50, 1..40)) {
            let fx = quorum_context();
            let b1 = fork(1);
            let e = election(&fx, &b1);
            for (i, tally) in tallies.iter().enumerate() {
                e.publish(fork(i as u64 + 2), Amount::raw(*tally));
                prop_assert!(e.blocks().len() <= MAX_BLOCKS);
                prop_assert!(e.contains(&b1.hash()));
            }
        }
    }
}
