//! Tunables for elections, the active election container, online weight
//! tracking and the vote cache.
//!
//! Each struct deserializes from its own TOML table and falls back to the
//! defaults below for missing keys.

use serde::{Deserialize, Serialize};

use orv_types::Amount;

use crate::ConsensusError;

/// Per-election timing and voting switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// Passive phase lasts this many base latencies.
    pub passive_duration_factor: u32,
    /// Minimum spacing between our own vote broadcasts for one election.
    pub vote_broadcast_interval_ms: u64,
    /// Minimum spacing between rebroadcasts of an unchanged winner.
    pub block_broadcast_interval_ms: u64,
    /// When false, quorum alone confirms; final votes are not awaited.
    pub require_final_votes: bool,
    /// Whether this node generates votes with its local representatives.
    pub enable_voting: bool,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            passive_duration_factor: 5,
            vote_broadcast_interval_ms: 1_000,
            block_broadcast_interval_ms: 15_000,
            require_final_votes: true,
            enable_voting: false,
        }
    }
}

/// Capacity limits for [`ActiveElections`](crate::ActiveElections).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveElectionsConfig {
    /// Maximum number of concurrent normal elections.
    pub size: usize,
    /// Share of `size` available to hinted elections.
    pub hinted_limit_percentage: usize,
    /// Share of `size` available to optimistic elections.
    pub optimistic_limit_percentage: usize,
    /// Confirmed winners awaiting cementing before new elections are refused.
    pub max_election_winners: usize,
    /// Entries kept in the recently cemented history.
    pub confirmation_history_size: usize,
    /// Entries kept in the recently confirmed set.
    pub confirmation_cache: usize,
}

impl Default for ActiveElectionsConfig {
    fn default() -> Self {
        Self {
            size: 5_000,
            hinted_limit_percentage: 20,
            optimistic_limit_percentage: 10,
            max_election_winners: 5_000,
            confirmation_history_size: 2_048,
            confirmation_cache: 65_536,
        }
    }
}

/// Online representative tracking and quorum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineRepsConfig {
    /// Floor for the online weight used in quorum, in raw.
    #[serde(with = "raw_amount")]
    pub online_weight_minimum: Amount,
    /// Percentage of online weight that forms a quorum.
    pub quorum_percent: u8,
    /// A representative counts as online this long after its last vote.
    pub weight_period_secs: u64,
}

impl Default for OnlineRepsConfig {
    fn default() -> Self {
        Self {
            online_weight_minimum: Amount::raw(60_000_000),
            quorum_percent: 67,
            weight_period_secs: 300,
        }
    }
}

/// Bounds for votes that arrive before their election.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteCacheConfig {
    pub max_size: usize,
    pub max_voters: usize,
    pub age_cutoff_secs: u64,
}

impl Default for VoteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 65_536,
            max_voters: 64,
            age_cutoff_secs: 900,
        }
    }
}

impl ActiveElectionsConfig {
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.size == 0 {
            return Err(ConsensusError::InvalidConfig(
                "active_elections.size must be positive".into(),
            ));
        }
        if self.hinted_limit_percentage > 100 || self.optimistic_limit_percentage > 100 {
            return Err(ConsensusError::InvalidConfig(
                "behavior limit percentages must be at most 100".into(),
            ));
        }
        if self.max_election_winners == 0 {
            return Err(ConsensusError::InvalidConfig(
                "active_elections.max_election_winners must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl OnlineRepsConfig {
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.quorum_percent == 0 || self.quorum_percent > 100 {
            return Err(ConsensusError::InvalidConfig(format!(
                "online_reps.quorum_percent must be in 1..=100, got {}",
                self.quorum_percent
            )));
        }
        if self.weight_period_secs == 0 {
            return Err(ConsensusError::InvalidConfig(
                "online_reps.weight_period_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// TOML integers stop at i64, so raw amounts travel as decimal strings.
mod raw_amount {
    use orv_types::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.number().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<u128>()
            .map(Amount::raw)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ActiveElectionsConfig::default().validate().is_ok());
        assert!(OnlineRepsConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_quorum() {
        let config = OnlineRepsConfig {
            quorum_percent: 101,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConsensusError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_container() {
        let config = ActiveElectionsConfig {
            size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn online_minimum_round_trips_through_toml_as_string() {
        let config = OnlineRepsConfig {
            online_weight_minimum: Amount::raw(u128::MAX - 7),
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains(&format!("\"{}\"", u128::MAX - 7)));
        let parsed: OnlineRepsConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let parsed: ElectionConfig = toml::from_str("enable_voting = true").unwrap();
        assert!(parsed.enable_voting);
        assert_eq!(parsed.passive_duration_factor, 5);
        assert!(parsed.require_final_votes);
    }
}
