//! Node configuration with TOML file support.

use std::path::Path;

use serde::{Deserialize, Serialize};

use orv_consensus::{ActiveElectionsConfig, ElectionConfig, OnlineRepsConfig, VoteCacheConfig};
use orv_types::NetworkId;

use crate::logging::LogFormat;
use crate::NodeError;

/// Which cementing algorithm the confirmation height processor runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationHeightMode {
    /// Unbounded while the uncemented backlog is small, bounded otherwise.
    #[default]
    Automatic,
    Bounded,
    Unbounded,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationHeightConfig {
    #[serde(default)]
    pub mode: ConfirmationHeightMode,

    /// Automatic mode switches to bounded once more than this many blocks
    /// are uncemented.
    #[serde(default = "default_unbounded_cutoff")]
    pub unbounded_cutoff: u64,

    /// Pending writes are held back at least this long while more hashes
    /// are awaiting, so they can be written in one transaction.
    #[serde(default = "default_batch_separate_pending_min_time_ms")]
    pub batch_separate_pending_min_time_ms: u64,

    /// Floor for the adaptive number of blocks cemented per transaction.
    #[serde(default = "default_min_batch_write_size")]
    pub min_batch_write_size: usize,

    /// Pending write entries that force a flush regardless of timing.
    #[serde(default = "default_max_pending_writes")]
    pub max_pending_writes: usize,
}

/// Configuration for a consensus node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_network")]
    pub network: NetworkId,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Period of the loop that advances election timers and samples online
    /// weight.
    #[serde(default = "default_request_loop_interval_ms")]
    pub request_loop_interval_ms: u64,

    /// Threads running confirmation observers.
    #[serde(default = "default_background_threads")]
    pub background_threads: usize,

    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub active_elections: ActiveElectionsConfig,

    #[serde(default)]
    pub election: ElectionConfig,

    #[serde(default)]
    pub online_reps: OnlineRepsConfig,

    #[serde(default)]
    pub vote_cache: VoteCacheConfig,

    #[serde(default)]
    pub confirmation_height: ConfirmationHeightConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_loop_interval_ms() -> u64 {
    500
}

fn default_background_threads() -> usize {
    2
}

fn default_unbounded_cutoff() -> u64 {
    16_384
}

fn default_batch_separate_pending_min_time_ms() -> u64 {
    50
}

fn default_min_batch_write_size() -> usize {
    16_384
}

fn default_max_pending_writes() -> usize {
    131_072
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.active_elections.validate()?;
        self.online_reps.validate()?;
        if self.request_loop_interval_ms == 0 {
            return Err(NodeError::Config(
                "request_loop_interval_ms must be positive".into(),
            ));
        }
        if self.vote_cache.max_size == 0 || self.vote_cache.max_voters == 0 {
            return Err(NodeError::Config(
                "vote_cache sizes must be positive".into(),
            ));
        }
        self.confirmation_height.validate()
    }
}

impl ConfirmationHeightConfig {
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.min_batch_write_size == 0 {
            return Err(NodeError::Config(
                "confirmation_height.min_batch_write_size must be positive".into(),
            ));
        }
        if self.max_pending_writes == 0 {
            return Err(NodeError::Config(
                "confirmation_height.max_pending_writes must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfirmationHeightConfig {
    fn default() -> Self {
        Self {
            mode: ConfirmationHeightMode::default(),
            unbounded_cutoff: default_unbounded_cutoff(),
            batch_separate_pending_min_time_ms: default_batch_separate_pending_min_time_ms(),
            min_batch_write_size: default_min_batch_write_size(),
            max_pending_writes: default_max_pending_writes(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            request_loop_interval_ms: default_request_loop_interval_ms(),
            background_threads: default_background_threads(),
            enable_metrics: false,
            active_elections: ActiveElectionsConfig::default(),
            election: ElectionConfig::default(),
            online_reps: OnlineRepsConfig::default(),
            vote_cache: VoteCacheConfig::default(),
            confirmation_height: ConfirmationHeightConfig::default(),
        }
    }
}
