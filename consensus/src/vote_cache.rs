//! Vote cache: votes that arrive before their election exists.
//!
//! Votes can arrive out of order. A representative may vote for a block
//! before this node has seen it or started an election for it. The cache
//! keeps those early votes with per-voter deduplication and running tallies,
//! so they can be replayed when the election starts and so fork replacement
//! can weigh a block that has no election yet.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use orv_types::{Account, Amount, BlockHash, Vote};

use crate::config::VoteCacheConfig;

struct CachedVote {
    voter: Account,
    weight: Amount,
    timestamp: u64,
    arrived: Instant,
}

impl CachedVote {
    fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

#[derive(Default)]
struct CacheEntry {
    votes: Vec<CachedVote>,
    tally: Amount,
    final_tally: Amount,
}

impl CacheEntry {
    fn recount(&mut self) {
        self.tally = self.votes.iter().map(|v| v.weight).sum();
        self.final_tally = self
            .votes
            .iter()
            .filter(|v| v.is_final())
            .map(|v| v.weight)
            .sum();
    }
}

/// A vote replayed from the cache into a freshly started election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedVoteInfo {
    pub voter: Account,
    pub weight: Amount,
    pub timestamp: u64,
}

/// Pre-election vote storage keyed by block hash.
///
/// If the block already has an active election, votes go directly to the
/// election and must not be inserted here.
pub struct VoteCache {
    config: VoteCacheConfig,
    entries: HashMap<BlockHash, CacheEntry>,
    /// Arrival instant -> hashes that received votes then. Lets cleanup
    /// visit only entries holding expired votes.
    time_index: BTreeMap<Instant, Vec<BlockHash>>,
}

impl VoteCache {
    pub fn new(config: VoteCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            time_index: BTreeMap::new(),
        }
    }

    /// Cache a vote for `hash`.
    ///
    /// A repeated voter is replaced only by a strictly newer timestamp. A full
    /// voter list evicts its lightest voter if the newcomer is heavier.
    pub fn insert(
        &mut self,
        hash: BlockHash,
        voter: Account,
        weight: Amount,
        timestamp: u64,
        now: Instant,
    ) {
        if !self.entries.contains_key(&hash) && self.entries.len() >= self.config.max_size {
            self.cleanup(now);
            if self.entries.len() >= self.config.max_size {
                self.evict_lightest();
            }
        }

        let max_voters = self.config.max_voters;
        let entry = self.entries.entry(hash).or_default();

        if let Some(existing) = entry.votes.iter_mut().find(|v| v.voter == voter) {
            if timestamp > existing.timestamp {
                existing.weight = weight;
                existing.timestamp = timestamp;
                existing.arrived = now;
                entry.recount();
                self.time_index.entry(now).or_default().push(hash);
            }
            return;
        }

        if entry.votes.len() >= max_voters {
            let lightest = entry
                .votes
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.weight)
                .map(|(i, v)| (i, v.weight));
            match lightest {
                Some((idx, lightest_weight)) if weight > lightest_weight => {
                    entry.votes.swap_remove(idx);
                }
                _ => return,
            }
        }

        entry.votes.push(CachedVote {
            voter,
            weight,
            timestamp,
            arrived: now,
        });
        entry.recount();
        self.time_index.entry(now).or_default().push(hash);
    }

    fn evict_lightest(&mut self) {
        let lightest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.tally)
            .map(|(hash, _)| *hash);
        if let Some(hash) = lightest {
            self.entries.remove(&hash);
        }
    }

    /// Remove and return all cached votes for `hash`.
    pub fn drain(&mut self, hash: &BlockHash) -> Vec<CachedVoteInfo> {
        self.entries
            .remove(hash)
            .map(|entry| {
                entry
                    .votes
                    .into_iter()
                    .map(|v| CachedVoteInfo {
                        voter: v.voter,
                        weight: v.weight,
                        timestamp: v.timestamp,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `(total_tally, final_tally)` for `hash`.
    pub fn tally(&self, hash: &BlockHash) -> (Amount, Amount) {
        self.entries
            .get(hash)
            .map(|e| (e.tally, e.final_tally))
            .unwrap_or((Amount::ZERO, Amount::ZERO))
    }

    pub fn erase(&mut self, hash: &BlockHash) -> bool {
        self.entries.remove(hash).is_some()
    }

    /// Drop votes older than the age cutoff.
    pub fn cleanup(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(Duration::from_secs(self.config.age_cutoff_secs))
        else {
            return;
        };

        let mut candidates = HashSet::new();
        let expired: Vec<Instant> = self.time_index.range(..=cutoff).map(|(k, _)| *k).collect();
        for key in &expired {
            if let Some(hashes) = self.time_index.remove(key) {
                candidates.extend(hashes);
            }
        }

        for hash in candidates {
            let now_empty = match self.entries.get_mut(&hash) {
                Some(entry) => {
                    entry.votes.retain(|v| v.arrived > cutoff);
                    entry.recount();
                    entry.votes.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.entries.remove(&hash);
            }
        }
    }

    /// Number of distinct block hashes with cached votes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Individual votes across all hashes.
    pub fn total_votes(&self) -> usize {
        self.entries.values().map(|e| e.votes.len()).sum()
    }
}

impl Default for VoteCache {
    fn default() -> Self {
        Self::new(VoteCacheConfig::default())
    }
}
