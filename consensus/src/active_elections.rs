//! Active elections container: manages all ongoing consensus elections.
//!
//! This is the top-level coordinator for the ORV election system. It holds a
//! bounded set of elections indexed by qualified root and by candidate block
//! hash, routes incoming votes, reacts to confirmation and cementing, and
//! cleans up finished elections on every tick.
//!
//! Locks are never nested across elections: the container's own maps are
//! locked, the needed `Arc<Election>` handles are cloned out, and the lock
//! is released before any per-election lock is taken.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use orv_types::{Account, Amount, Block, BlockHash, QualifiedRoot, Vote};
use orv_utils::{DetailType, ObserverSet, Spawner, StatType};
use tracing::{debug, info};

use crate::behavior::ElectionBehavior;
use crate::config::{ActiveElectionsConfig, VoteCacheConfig};
use crate::election::{ConfirmationAction, Election, ElectionContext, PublishResult};
use crate::election_status::ElectionStatus;
use crate::recently_cemented::RecentlyCemented;
use crate::recently_confirmed::RecentlyConfirmed;
use crate::vote_cache::VoteCache;
use crate::vote_info::{VoteCode, VoteSource};

/// Outcome of [`ActiveElections::insert`].
#[derive(Clone, Debug)]
pub struct InsertResult {
    /// The new election, or the existing one for the same root.
    pub election: Option<Arc<Election>>,
    pub inserted: bool,
}

/// Observer lists other components subscribe to.
#[derive(Default)]
pub struct ActiveObservers {
    /// An election confirmed its winner. Runs on the spawner.
    pub confirmed: ObserverSet<ElectionStatus>,
    /// A block was cemented, with or without an election.
    pub cemented: ObserverSet<ElectionStatus>,
    /// Room for new elections may have opened up.
    pub vacancy: ObserverSet<()>,
    /// A live vote was accepted by some election.
    pub live_vote: ObserverSet<Account>,
}

#[derive(Default)]
struct ActiveData {
    roots: HashMap<QualifiedRoot, Arc<Election>>,
    blocks: HashMap<BlockHash, Arc<Election>>,
    count_by_behavior: HashMap<ElectionBehavior, usize>,
}

impl ActiveData {
    fn count(&self, behavior: ElectionBehavior) -> usize {
        self.count_by_behavior.get(&behavior).copied().unwrap_or(0)
    }
}

pub struct ActiveElections {
    config: ActiveElectionsConfig,
    ctx: Arc<ElectionContext>,
    spawner: Arc<dyn Spawner>,
    data: Mutex<ActiveData>,
    /// Confirmed winners not yet cemented.
    winner_details: Mutex<HashMap<BlockHash, Arc<Election>>>,
    recently_confirmed: Mutex<RecentlyConfirmed>,
    recently_cemented: Mutex<RecentlyCemented>,
    vote_cache: Mutex<VoteCache>,
    observers: Arc<ActiveObservers>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ActiveElections {
    pub fn new(
        config: ActiveElectionsConfig,
        vote_cache_config: VoteCacheConfig,
        ctx: Arc<ElectionContext>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            recently_confirmed: Mutex::new(RecentlyConfirmed::new(config.confirmation_cache)),
            recently_cemented: Mutex::new(RecentlyCemented::new(config.confirmation_history_size)),
            vote_cache: Mutex::new(VoteCache::new(vote_cache_config)),
            config,
            ctx,
            spawner,
            data: Mutex::new(ActiveData::default()),
            winner_details: Mutex::new(HashMap::new()),
            observers: Arc::new(ActiveObservers::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn observers(&self) -> &ActiveObservers {
        &self.observers
    }

    pub fn context(&self) -> &Arc<ElectionContext> {
        &self.ctx
    }

    // ── Capacity ───────────────────────────────────────────────────────────

    /// Maximum concurrent elections of `behavior`.
    pub fn limit(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Normal => self.config.size,
            ElectionBehavior::Hinted => {
                self.config.hinted_limit_percentage * self.config.size / 100
            }
            ElectionBehavior::Optimistic => {
                self.config.optimistic_limit_percentage * self.config.size / 100
            }
            ElectionBehavior::Manual => usize::MAX,
        }
    }

    /// Room left for new elections of `behavior`. May be negative when the
    /// container is overfilled or too many winners await cementing.
    pub fn vacancy(&self, behavior: ElectionBehavior) -> i64 {
        let data = lock(&self.data);
        self.vacancy_locked(&data, behavior)
    }

    fn vacancy_locked(&self, data: &ActiveData, behavior: ElectionBehavior) -> i64 {
        let election_vacancy = match behavior {
            ElectionBehavior::Manual => return i64::MAX,
            ElectionBehavior::Normal => self.config.size as i64 - data.roots.len() as i64,
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => {
                self.limit(behavior) as i64 - data.count(behavior) as i64
            }
        };
        let winners_vacancy =
            self.config.max_election_winners as i64 - lock(&self.winner_details).len() as i64;
        election_vacancy.min(winners_vacancy)
    }

    // ── Insertion ──────────────────────────────────────────────────────────

    /// Start an election for `block`, unless one exists for its root, the
    /// root was recently confirmed, or there is no vacancy for `behavior`.
    ///
    /// Votes cached for the block are replayed into a new election.
    pub fn insert(
        &self,
        block: &Arc<Block>,
        behavior: ElectionBehavior,
        confirmation_action: Option<ConfirmationAction>,
        now: Instant,
    ) -> InsertResult {
        let root = block.qualified_root();
        let hash = block.hash();

        let (election, inserted) = {
            let mut data = lock(&self.data);
            if let Some(existing) = data.roots.get(&root) {
                (Some(Arc::clone(existing)), false)
            } else if lock(&self.recently_confirmed).root_exists(&root) {
                (None, false)
            } else if self.vacancy_locked(&data, behavior) <= 0 {
                self.ctx
                    .stats
                    .inc(StatType::ActiveElections, DetailType::InsertFailed);
                (None, false)
            } else {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let observers = Arc::clone(&self.observers);
                let mut election =
                    Election::new(id, Arc::clone(block), behavior, Arc::clone(&self.ctx), now)
                        .with_live_vote_action(Arc::new(move |rep: &Account| {
                            observers.live_vote.notify(rep)
                        }));
                if let Some(action) = confirmation_action {
                    election = election.with_confirmation_action(action);
                }
                let election = Arc::new(election);
                data.roots.insert(root, Arc::clone(&election));
                data.blocks.insert(hash, Arc::clone(&election));
                *data.count_by_behavior.entry(behavior).or_default() += 1;
                (Some(election), true)
            }
        };

        if inserted {
            if let Some(election) = &election {
                self.ctx
                    .stats
                    .inc(StatType::ActiveElections, DetailType::Started);
                self.ctx
                    .stats
                    .inc(StatType::ActiveElections, behavior.detail());
                debug!(id = election.id(), %root, %hash, ?behavior, "election started");
                self.replay_cached_votes(election, &hash, now);
                self.observers.vacancy.notify(&());
            }
        }
        if let Some(election) = &election {
            election.broadcast_vote(now);
        }
        InsertResult { election, inserted }
    }

    fn replay_cached_votes(&self, election: &Arc<Election>, hash: &BlockHash, now: Instant) {
        let cached = lock(&self.vote_cache).drain(hash);
        for vote in cached {
            self.vote(election, &vote.voter, vote.timestamp, hash, VoteSource::Cache, now);
        }
    }

    /// Offer a fork to an existing election. Returns true when the block
    /// became a new candidate.
    pub fn publish(&self, block: Arc<Block>, election: &Arc<Election>, now: Instant) -> bool {
        let hash = block.hash();
        let inactive_tally = lock(&self.vote_cache).tally(&hash).0;
        match election.publish(block, inactive_tally) {
            PublishResult::Added => {
                lock(&self.data).blocks.insert(hash, Arc::clone(election));
                self.replay_cached_votes(election, &hash, now);
                true
            }
            PublishResult::Replaced(evicted) => {
                {
                    let mut data = lock(&self.data);
                    if data.blocks.get(&evicted).is_some_and(|e| Arc::ptr_eq(e, election)) {
                        data.blocks.remove(&evicted);
                    }
                    data.blocks.insert(hash, Arc::clone(election));
                }
                self.ctx
                    .stats
                    .inc(StatType::Election, DetailType::ForkReplaced);
                self.replay_cached_votes(election, &hash, now);
                true
            }
            PublishResult::Updated => false,
            PublishResult::Rejected => {
                self.ctx
                    .stats
                    .inc(StatType::Election, DetailType::PublishRejected);
                false
            }
        }
    }

    // ── Votes ──────────────────────────────────────────────────────────────

    /// Route every hash of `vote` to its election. Hashes of finished
    /// elections are `Late`; hashes without an election are cached as
    /// `Indeterminate`.
    pub fn process_vote(
        &self,
        vote: &Vote,
        source: VoteSource,
        now: Instant,
    ) -> HashMap<BlockHash, VoteCode> {
        if source == VoteSource::Live {
            self.ctx.online_reps.observe(&vote.voter, now);
        }
        let mut results = HashMap::new();
        for hash in &vote.hashes {
            let election = lock(&self.data).blocks.get(hash).cloned();
            let code = match election {
                Some(election) => {
                    self.vote(&election, &vote.voter, vote.timestamp, hash, source, now)
                }
                None => {
                    let late = lock(&self.recently_confirmed).hash_exists(hash);
                    if late {
                        VoteCode::Late
                    } else {
                        self.cache_vote(vote, hash, now);
                        VoteCode::Indeterminate
                    }
                }
            };
            self.ctx.stats.inc(StatType::ElectionVote, code.detail());
            results.insert(*hash, code);
        }
        results
    }

    fn cache_vote(&self, vote: &Vote, hash: &BlockHash, now: Instant) {
        let weight = self.ctx.ledger.weight(&vote.voter);
        if weight.is_zero() {
            return;
        }
        lock(&self.vote_cache).insert(*hash, vote.voter, weight, vote.timestamp, now);
        self.ctx.stats.inc(StatType::VoteCache, DetailType::Vote);
    }

    /// Apply a single vote to `election`.
    pub fn vote(
        &self,
        election: &Arc<Election>,
        rep: &Account,
        timestamp: u64,
        hash: &BlockHash,
        source: VoteSource,
        now: Instant,
    ) -> VoteCode {
        let outcome = election.vote(rep, timestamp, hash, source, now);
        if let Some(status) = outcome.confirmed {
            self.on_confirmed(election, status);
        }
        outcome.code
    }

    /// Cached weight for a block that may not have an election yet.
    pub fn cached_tally(&self, hash: &BlockHash) -> (Amount, Amount) {
        lock(&self.vote_cache).tally(hash)
    }

    // ── Confirmation and cementing ─────────────────────────────────────────

    /// Bookkeeping for a freshly confirmed election, run once per winner.
    fn on_confirmed(&self, election: &Arc<Election>, status: ElectionStatus) {
        let winner = status.winner.hash();
        {
            let mut winners = lock(&self.winner_details);
            if winners.contains_key(&winner) {
                return;
            }
            winners.insert(winner, Arc::clone(election));
        }
        lock(&self.recently_confirmed).put(election.qualified_root(), winner);

        let losers = election.drop_losing_candidates();
        if !losers.is_empty() {
            let mut data = lock(&self.data);
            for hash in &losers {
                if data.blocks.get(hash).is_some_and(|e| Arc::ptr_eq(e, election)) {
                    data.blocks.remove(hash);
                }
            }
        }

        self.ctx
            .stats
            .inc(StatType::ActiveElections, DetailType::Confirmed);
        info!(
            id = election.id(),
            root = %election.qualified_root(),
            %winner,
            evicted = losers.len(),
            "election confirmed"
        );

        let observers = Arc::clone(&self.observers);
        let action = election.confirmation_action();
        self.spawner.spawn(Box::new(move || {
            observers.confirmed.notify(&status);
            if let Some(action) = action {
                action(&status.winner);
            }
        }));
    }

    /// Confirm an election outright, bypassing votes.
    pub fn force_confirm(&self, election: &Arc<Election>, now: Instant) {
        if let Some(status) = election.force_confirm(now) {
            self.on_confirmed(election, status);
        }
    }

    /// Called by cementing for every block it writes.
    ///
    /// Confirms a still-open election whose winner was cemented from below,
    /// releases the winner slot and records the outcome.
    pub fn block_cemented(&self, block: &Arc<Block>, now: Instant) {
        let hash = block.hash();
        if let Some(election) = self.election(&block.qualified_root()) {
            if let Some(status) = election.try_confirm(&hash, now) {
                self.ctx
                    .stats
                    .inc(StatType::ActiveElections, DetailType::ConfirmedByHeight);
                self.on_confirmed(&election, status);
            }
        }

        let election = lock(&self.winner_details).remove(&hash);
        let status = match &election {
            Some(election) => election.current_status(),
            None => ElectionStatus::inactive(Arc::clone(block)),
        };
        lock(&self.recently_cemented).put(status.clone());
        self.observers.cemented.notify(&status);
        if election.is_some() {
            self.observers.vacancy.notify(&());
        }
    }

    /// Called by cementing when a confirmed winner turned out to be cemented
    /// already. Releases its winner slot.
    pub fn block_already_cemented(&self, hash: &BlockHash) {
        let released = lock(&self.winner_details).remove(hash).is_some();
        if released {
            self.observers.vacancy.notify(&());
        }
    }

    pub fn winner_details_len(&self) -> usize {
        lock(&self.winner_details).len()
    }

    pub fn has_winner_details(&self, hash: &BlockHash) -> bool {
        lock(&self.winner_details).contains_key(hash)
    }

    pub fn recently_cemented(&self) -> Vec<ElectionStatus> {
        lock(&self.recently_cemented).list()
    }

    pub fn recently_confirmed_contains(&self, hash: &BlockHash) -> bool {
        lock(&self.recently_confirmed).hash_exists(hash)
    }

    pub fn recently_confirmed_len(&self) -> usize {
        lock(&self.recently_confirmed).len()
    }

    // ── Removal ────────────────────────────────────────────────────────────

    /// Remove the election for `root`, cancelling it if unconfirmed.
    pub fn erase(&self, root: &QualifiedRoot, now: Instant) -> bool {
        match self.election(root) {
            Some(election) => self.erase_election(&election, now),
            None => false,
        }
    }

    pub fn erase_block(&self, block: &Block, now: Instant) -> bool {
        self.erase(&block.qualified_root(), now)
    }

    fn erase_election(&self, election: &Arc<Election>, now: Instant) -> bool {
        let root = election.qualified_root();
        {
            let mut data = lock(&self.data);
            match data.roots.get(&root) {
                Some(current) if Arc::ptr_eq(current, election) => {
                    data.roots.remove(&root);
                }
                _ => return false,
            }
            if let Some(count) = data.count_by_behavior.get_mut(&election.behavior()) {
                *count = count.saturating_sub(1);
            }
        }

        let hashes: Vec<BlockHash> = election.blocks().into_keys().collect();
        {
            let mut data = lock(&self.data);
            for hash in &hashes {
                if data.blocks.get(hash).is_some_and(|e| Arc::ptr_eq(e, election)) {
                    data.blocks.remove(hash);
                }
            }
        }

        let detail = if election.confirmed() {
            DetailType::ExpiredConfirmed
        } else {
            election.cancel(now);
            DetailType::ExpiredUnconfirmed
        };
        self.ctx.stats.inc(StatType::ActiveElections, detail);
        self.ctx
            .stats
            .inc(StatType::ActiveElections, DetailType::Erased);
        debug!(id = election.id(), %root, ?detail, "election erased");
        self.observers.vacancy.notify(&());
        true
    }

    /// Drive every election's timers, drop finished ones, age out the vote
    /// cache and trim an overfilled container.
    pub fn tick(&self, now: Instant) {
        for election in self.list() {
            if election.transition_time(now) {
                self.erase_election(&election, now);
            }
        }
        lock(&self.vote_cache).cleanup(now);
        self.trim(now);
    }

    /// Erase the oldest non-manual elections while the container holds more
    /// than 125% of its size.
    pub fn trim(&self, now: Instant) {
        let ceiling = self.config.size + self.config.size / 4;
        loop {
            let oldest = {
                let data = lock(&self.data);
                if data.roots.len() <= ceiling {
                    return;
                }
                data.roots
                    .values()
                    .filter(|e| e.behavior() != ElectionBehavior::Manual)
                    .min_by_key(|e| e.id())
                    .cloned()
            };
            let Some(oldest) = oldest else {
                return;
            };
            self.ctx
                .stats
                .inc(StatType::ActiveElections, DetailType::Trimmed);
            self.erase_election(&oldest, now);
        }
    }

    /// Erase every election.
    pub fn clear(&self, now: Instant) {
        for election in self.list() {
            self.erase_election(&election, now);
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn election(&self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        lock(&self.data).roots.get(root).cloned()
    }

    pub fn active_root(&self, root: &QualifiedRoot) -> bool {
        lock(&self.data).roots.contains_key(root)
    }

    pub fn active_block(&self, hash: &BlockHash) -> bool {
        lock(&self.data).blocks.contains_key(hash)
    }

    /// All elections, oldest first.
    pub fn list(&self) -> Vec<Arc<Election>> {
        let mut elections: Vec<Arc<Election>> = lock(&self.data).roots.values().cloned().collect();
        elections.sort_by_key(|e| e.id());
        elections
    }

    pub fn len(&self) -> usize {
        lock(&self.data).roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, behavior: ElectionBehavior) -> usize {
        lock(&self.data).count(behavior)
    }
}
