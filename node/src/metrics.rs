//! Prometheus metrics for elections and cementing.
//!
//! [`ConsensusMetrics`] owns a dedicated [`Registry`] so several nodes can
//! live in one process without clashing in the global default registry.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct ConsensusMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub elections_started: IntCounter,
    pub elections_confirmed: IntCounter,
    /// Elections removed without being cemented through them.
    pub elections_expired: IntCounter,
    pub votes_processed: IntCounter,
    pub blocks_cemented: IntCounter,
    /// Hashes handed to cementing that were already at or below the
    /// account's confirmation height.
    pub blocks_already_cemented: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub active_elections: IntGauge,
    pub awaiting_cementing: IntGauge,
}

impl ConsensusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let elections_started = register_int_counter_with_registry!(
            Opts::new("orv_elections_started_total", "Elections started"),
            registry
        )?;
        let elections_confirmed = register_int_counter_with_registry!(
            Opts::new("orv_elections_confirmed_total", "Elections that confirmed a winner"),
            registry
        )?;
        let elections_expired = register_int_counter_with_registry!(
            Opts::new(
                "orv_elections_expired_total",
                "Elections dropped before their winner was cemented"
            ),
            registry
        )?;
        let votes_processed = register_int_counter_with_registry!(
            Opts::new("orv_votes_processed_total", "Votes applied to an election"),
            registry
        )?;
        let blocks_cemented = register_int_counter_with_registry!(
            Opts::new("orv_blocks_cemented_total", "Blocks cemented"),
            registry
        )?;
        let blocks_already_cemented = register_int_counter_with_registry!(
            Opts::new(
                "orv_blocks_already_cemented_total",
                "Confirmed hashes that were already cemented"
            ),
            registry
        )?;
        let active_elections = register_int_gauge_with_registry!(
            Opts::new("orv_active_elections", "Elections currently active"),
            registry
        )?;
        let awaiting_cementing = register_int_gauge_with_registry!(
            Opts::new(
                "orv_awaiting_cementing",
                "Confirmed hashes queued for the confirmation height processor"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            elections_started,
            elections_confirmed,
            elections_expired,
            votes_processed,
            blocks_cemented,
            blocks_already_cemented,
            active_elections,
            awaiting_cementing,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = ConsensusMetrics::new().unwrap();
        assert_eq!(metrics.blocks_cemented.get(), 0);
        assert_eq!(metrics.active_elections.get(), 0);
    }

    #[test]
    fn independent_registries() {
        let a = ConsensusMetrics::new().unwrap();
        let b = ConsensusMetrics::new().unwrap();
        a.blocks_cemented.inc_by(5);
        assert_eq!(a.blocks_cemented.get(), 5);
        assert_eq!(b.blocks_cemented.get(), 0);
    }

    #[test]
    fn encode_lists_metric_names() {
        let metrics = ConsensusMetrics::new().unwrap();
        metrics.elections_started.inc();
        metrics.awaiting_cementing.set(3);
        let text = metrics.encode().unwrap();
        assert!(text.contains("orv_elections_started_total 1"));
        assert!(text.contains("orv_awaiting_cementing 3"));
    }
}
