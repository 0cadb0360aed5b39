//! Network identifier.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies which network a node participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Live,
    /// The public test network.
    Test,
    /// Local development network. Consensus thresholds are relaxed here.
    Dev,
}

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    /// Expected one-way propagation latency; election timers scale from it.
    pub fn base_latency(&self) -> Duration {
        if self.is_dev() {
            Duration::from_millis(25)
        } else {
            Duration::from_millis(1000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_latency_is_short() {
        assert_eq!(NetworkId::Dev.base_latency(), Duration::from_millis(25));
        assert_eq!(NetworkId::Live.base_latency(), Duration::from_secs(1));
        assert_eq!(NetworkId::Test.base_latency(), Duration::from_secs(1));
    }
}
