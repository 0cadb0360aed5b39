//! The consensus node: wires elections to cementing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use orv_consensus::{
    ActiveElections, ElectionActions, ElectionBehavior, ElectionContext, ElectionStatus,
    InsertResult, NullElectionActions, OnlineReps, VoteCode, VoteSource,
};
use orv_ledger::{Ledger, LedgerConstants};
use orv_store::LedgerStore;
use orv_types::{Block, BlockHash, Vote};
use orv_utils::{DetailType, Spawner, StatType, Stats, ThreadPool};

use crate::cementing::ConfirmationHeightProcessor;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::ConsensusMetrics;
use crate::shutdown::ShutdownController;

pub struct ConsensusNode {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    online_reps: Arc<OnlineReps>,
    active: Arc<ActiveElections>,
    processor: Arc<ConfirmationHeightProcessor>,
    /// Present when `enable_metrics` is set.
    metrics: Option<Arc<ConsensusMetrics>>,
    shutdown: Arc<ShutdownController>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ConsensusNode {
    /// Build a node that broadcasts nowhere and runs observers on a thread
    /// pool.
    pub fn new(config: NodeConfig, store: Arc<dyn LedgerStore>) -> Result<Self, NodeError> {
        let spawner: Arc<dyn Spawner> =
            Arc::new(ThreadPool::new(config.background_threads, "orv-observers"));
        Self::with_collaborators(config, store, Arc::new(NullElectionActions::new()), spawner)
    }

    pub fn with_collaborators(
        config: NodeConfig,
        store: Arc<dyn LedgerStore>,
        actions: Arc<dyn ElectionActions>,
        spawner: Arc<dyn Spawner>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let ledger = Arc::new(Ledger::new(store, LedgerConstants::new(config.network))?);
        let stats = Arc::new(Stats::new());
        let online_reps = Arc::new(OnlineReps::new(
            Arc::clone(&ledger),
            config.online_reps.clone(),
        ));
        let ctx = Arc::new(ElectionContext {
            ledger: Arc::clone(&ledger),
            online_reps: Arc::clone(&online_reps),
            actions,
            stats: Arc::clone(&stats),
            network: config.network,
            config: config.election.clone(),
        });
        let active = Arc::new(ActiveElections::new(
            config.active_elections.clone(),
            config.vote_cache.clone(),
            ctx,
            spawner,
        ));
        let processor = Arc::new(ConfirmationHeightProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&stats),
            &config.confirmation_height,
        ));
        let metrics = if config.enable_metrics {
            Some(Arc::new(ConsensusMetrics::new()?))
        } else {
            None
        };

        let node = Self {
            config,
            ledger,
            stats,
            online_reps,
            active,
            processor,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Mutex::new(Vec::new()),
        };
        node.wire_observers();
        Ok(node)
    }

    fn wire_observers(&self) {
        // confirmed winners go to cementing
        let processor = Arc::clone(&self.processor);
        let metrics = self.metrics.clone();
        self.active
            .observers()
            .confirmed
            .subscribe(move |status: &ElectionStatus| {
                processor.add(status.winner.hash());
                if let Some(metrics) = &metrics {
                    metrics.elections_confirmed.inc();
                }
            });

        // cemented blocks close out their elections
        let active: Weak<ActiveElections> = Arc::downgrade(&self.active);
        let metrics = self.metrics.clone();
        self.processor.add_cemented_observer(move |block: &Arc<Block>| {
            if let Some(active) = active.upgrade() {
                active.block_cemented(block, Instant::now());
            }
            if let Some(metrics) = &metrics {
                metrics.blocks_cemented.inc();
            }
        });

        // a winner confirmed after it was cemented still holds a winner slot
        let active: Weak<ActiveElections> = Arc::downgrade(&self.active);
        let metrics = self.metrics.clone();
        self.processor
            .add_already_cemented_observer(move |hash: &BlockHash| {
                tracing::trace!(%hash, "block already cemented");
                if let Some(active) = active.upgrade() {
                    active.block_already_cemented(hash);
                }
                if let Some(metrics) = &metrics {
                    metrics.blocks_already_cemented.inc();
                }
            });
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn online_reps(&self) -> &Arc<OnlineReps> {
        &self.online_reps
    }

    pub fn active(&self) -> &Arc<ActiveElections> {
        &self.active
    }

    pub fn processor(&self) -> &Arc<ConfirmationHeightProcessor> {
        &self.processor
    }

    pub fn metrics(&self) -> Option<&Arc<ConsensusMetrics>> {
        self.metrics.as_ref()
    }

    /// Start an election for `block`.
    pub fn start_election(&self, block: &Arc<Block>, behavior: ElectionBehavior) -> InsertResult {
        let result = self.active.insert(block, behavior, None, Instant::now());
        if result.inserted {
            if let Some(metrics) = &self.metrics {
                metrics.elections_started.inc();
                metrics.active_elections.set(self.active.len() as i64);
            }
        }
        result
    }

    /// Route a vote to the elections it names.
    pub fn process_vote(&self, vote: &Vote, source: VoteSource) -> HashMap<BlockHash, VoteCode> {
        let results = self.active.process_vote(vote, source, Instant::now());
        if let Some(metrics) = &self.metrics {
            let applied = results.values().filter(|c| **c == VoteCode::Vote).count();
            metrics.votes_processed.inc_by(applied as u64);
        }
        results
    }

    /// Cement `hash` without an election, e.g. when it was confirmed
    /// implicitly by a cemented successor elsewhere.
    pub fn confirm_block(&self, hash: BlockHash) {
        self.processor.add(hash);
    }

    /// Launch the cementing thread and the request loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), NodeError> {
        tracing::info!(
            network = self.config.network.as_str(),
            blocks = self.ledger.block_count(),
            cemented = self.ledger.cemented_count(),
            "consensus node starting"
        );
        self.processor.start()?;

        let active = Arc::clone(&self.active);
        let online_reps = Arc::clone(&self.online_reps);
        let processor = Arc::clone(&self.processor);
        let metrics = self.metrics.clone();
        let stats = Arc::clone(&self.stats);
        let expired_seen = AtomicU64::new(0);
        let mut shutdown_rx = self.shutdown.subscribe();
        let period = Duration::from_millis(self.config.request_loop_interval_ms);

        let request_loop = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("request loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Instant::now();
                        active.tick(now);
                        online_reps.sample(now);

                        if let Some(metrics) = &metrics {
                            metrics.active_elections.set(active.len() as i64);
                            metrics
                                .awaiting_cementing
                                .set(processor.awaiting_processing_len() as i64);
                            let expired = stats
                                .count(StatType::ActiveElections, DetailType::ExpiredUnconfirmed);
                            let previous = expired_seen.swap(expired, Ordering::Relaxed);
                            metrics.elections_expired.inc_by(expired.saturating_sub(previous));
                        }
                        tracing::trace!(
                            elections = active.len(),
                            online = %online_reps.online(),
                            "request loop tick"
                        );
                    }
                }
            }
        });
        self.task_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request_loop);
        Ok(())
    }

    /// Stop the request loop, then drain and join the cementing thread.
    pub async fn stop(&self) {
        tracing::info!("consensus node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self
            .task_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "background task failed");
            }
        }

        let processor = Arc::clone(&self.processor);
        if let Err(e) = tokio::task::spawn_blocking(move || processor.stop()).await {
            tracing::error!(error = %e, "confirmation height processor failed to stop");
        }
        tracing::info!("consensus node stopped");
    }
}
