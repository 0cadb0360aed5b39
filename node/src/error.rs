use orv_types::BlockHash;
use thiserror::Error;

/// Failures while cementing. Reported and the affected hash dropped; the
/// processor keeps running.
#[derive(Debug, Error)]
pub enum CementError {
    #[error("ledger error: {0}")]
    Ledger(#[from] orv_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] orv_store::StoreError),

    #[error("block {0} is missing from the ledger")]
    MissingBlock(BlockHash),

    #[error("block {0} has no sideband")]
    MissingSideband(BlockHash),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] orv_ledger::LedgerError),

    #[error("consensus error: {0}")]
    Consensus(#[from] orv_consensus::ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] orv_store::StoreError),

    #[error("cementing error: {0}")]
    Cement(#[from] CementError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node is already running")]
    AlreadyStarted,
}
