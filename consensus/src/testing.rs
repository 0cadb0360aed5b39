//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;

use orv_ledger::{Ledger, LedgerConstants};
use orv_nullables::{NullClock, NullStore};
use orv_types::{Account, Amount, Block, BlockHash, BlockType, Link, NetworkId};
use orv_utils::Stats;

use crate::actions::NullElectionActions;
use crate::config::{ElectionConfig, OnlineRepsConfig};
use crate::election::ElectionContext;
use crate::online_reps::OnlineReps;

pub(crate) struct TestContext {
    pub ctx: Arc<ElectionContext>,
    pub actions: Arc<NullElectionActions>,
    pub stats: Arc<Stats>,
    pub clock: NullClock,
}

/// Reps 1..=4 weigh 40, 35, 25 and 70 raw. Nobody is observed online, so the
/// 100 raw floor makes the quorum delta 67 raw.
pub(crate) fn context(config: ElectionConfig, actions: NullElectionActions) -> TestContext {
    let ledger = Arc::new(Ledger::new(Arc::new(NullStore::new()), LedgerConstants::dev()).unwrap());
    let online_reps = Arc::new(OnlineReps::new(
        Arc::clone(&ledger),
        OnlineRepsConfig {
            online_weight_minimum: Amount::raw(100),
            ..Default::default()
        },
    ));
    for (n, weight) in [(1, 40), (2, 35), (3, 25), (4, 70)] {
        ledger.rep_weights().add(&rep(n), Amount::raw(weight));
    }
    let actions = Arc::new(actions);
    let stats = Arc::new(Stats::new());
    let ctx = Arc::new(ElectionContext {
        ledger,
        online_reps,
        actions: actions.clone(),
        stats: Arc::clone(&stats),
        network: NetworkId::Dev,
        config,
    });
    TestContext {
        ctx,
        actions,
        stats,
        clock: NullClock::new(),
    }
}

/// Quorum alone confirms; voting disabled.
pub(crate) fn quorum_context() -> TestContext {
    context(
        ElectionConfig {
            require_final_votes: false,
            ..Default::default()
        },
        NullElectionActions::new(),
    )
}

pub(crate) fn rep(n: u64) -> Account {
    Account::from_u64(n)
}

/// Competing sends from one account sharing a previous block.
pub(crate) fn fork(n: u64) -> Arc<Block> {
    fork_of(600, n)
}

/// Fork `n` under root `root`.
pub(crate) fn fork_of(root: u64, n: u64) -> Arc<Block> {
    Arc::new(Block::new(
        BlockType::Send,
        Account::from_u64(500),
        BlockHash::from_u64(root),
        Account::from_u64(500),
        Amount::raw(n as u128),
        Link::from(Account::from_u64(700 + n)),
    ))
}
