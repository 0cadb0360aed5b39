//! Online representative tracking: which representatives are actively voting.
//!
//! Quorum is calculated against *online* voting weight, not total delegated
//! weight. A representative counts as online if it cast a live vote within
//! the weight period. The quorum denominator never drops below the trended
//! (EMA) online weight or the configured minimum, so a temporary dip in
//! participation cannot collapse it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use orv_ledger::Ledger;
use orv_types::{Account, Amount};
use tracing::debug;

use crate::config::OnlineRepsConfig;

/// Decay percentage for EMA trending (95 = 0.95, slow decay).
const TREND_DECAY_PCT: u8 = 95;

/// Principal representatives hold more than 1/1000 of trended weight.
const PRINCIPAL_DIVISOR: u128 = 1000;

struct OnlineData {
    /// Representative -> arrival time of its most recent live vote.
    reps: HashMap<Account, Instant>,
    online: Amount,
    trended: Amount,
}

pub struct OnlineReps {
    ledger: Arc<Ledger>,
    config: OnlineRepsConfig,
    data: Mutex<OnlineData>,
}

impl OnlineReps {
    pub fn new(ledger: Arc<Ledger>, config: OnlineRepsConfig) -> Self {
        Self {
            ledger,
            config,
            data: Mutex::new(OnlineData {
                reps: HashMap::new(),
                online: Amount::ZERO,
                trended: Amount::ZERO,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OnlineData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn weight_period(&self) -> Duration {
        Duration::from_secs(self.config.weight_period_secs)
    }

    /// Record a live vote from `rep`. Zero-weight voters are not tracked.
    pub fn observe(&self, rep: &Account, now: Instant) {
        if self.ledger.weight(rep).is_zero() {
            return;
        }
        let mut data = self.lock();
        let newly_online = data.reps.insert(*rep, now).is_none();
        if newly_online {
            data.online = self.sum_weights(&data.reps);
        }
    }

    /// Drop stale representatives and fold the current online weight into
    /// the trend. Called periodically by the node.
    pub fn sample(&self, now: Instant) {
        let period = self.weight_period();
        let mut data = self.lock();
        data.reps
            .retain(|_, seen| now.saturating_duration_since(*seen) <= period);
        let current = self.sum_weights(&data.reps);
        data.online = current;
        data.trended = if data.trended.is_zero() {
            current
        } else {
            data.trended.percent(TREND_DECAY_PCT) + current.percent(100 - TREND_DECAY_PCT)
        };
        debug!(
            online = %data.online,
            trended = %data.trended,
            reps = data.reps.len(),
            "online weight sampled"
        );
    }

    fn sum_weights(&self, reps: &HashMap<Account, Instant>) -> Amount {
        reps.keys().map(|rep| self.ledger.weight(rep)).sum()
    }

    /// Weight of representatives currently considered online.
    pub fn online(&self) -> Amount {
        self.lock().online
    }

    /// Trended online weight, floored at the configured minimum.
    pub fn trended(&self) -> Amount {
        self.lock().trended.max(self.config.online_weight_minimum)
    }

    /// Weight gap the leading candidate needs over the runner-up.
    pub fn delta(&self) -> Amount {
        let data = self.lock();
        data.online
            .max(data.trended)
            .max(self.config.online_weight_minimum)
            .percent(self.config.quorum_percent)
    }

    /// Votes from representatives at or below this weight are not counted
    /// outside dev networks.
    pub fn minimum_principal_weight(&self) -> Amount {
        Amount::raw(self.trended().number() / PRINCIPAL_DIVISOR)
    }

    pub fn online_count(&self) -> usize {
        self.lock().reps.len()
    }

    pub fn is_online(&self, rep: &Account) -> bool {
        self.lock().reps.contains_key(rep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orv_ledger::LedgerConstants;
    use orv_nullables::NullStore;

    fn rep(n: u64) -> Account {
        Account::from_u64(n)
    }

    fn setup(minimum: u128) -> (Arc<Ledger>, OnlineReps) {
        let ledger =
            Arc::new(Ledger::new(Arc::new(NullStore::new()), LedgerConstants::dev()).unwrap());
        let config = OnlineRepsConfig {
            online_weight_minimum: Amount::raw(minimum),
            quorum_percent: 67,
            weight_period_secs: 300,
        };
        let reps = OnlineReps::new(Arc::clone(&ledger), config);
        (ledger, reps)
    }

    #[test]
    fn observed_reps_count_towards_online_weight() {
        let (ledger, reps) = setup(0);
        ledger.rep_weights().add(&rep(1), Amount::raw(100));
        ledger.rep_weights().add(&rep(2), Amount::raw(200));
        let now = Instant::now();
        reps.observe(&rep(1), now);
        reps.observe(&rep(2), now);
        assert_eq!(reps.online(), Amount::raw(300));
        assert_eq!(reps.online_count(), 2);
    }

    #[test]
    fn zero_weight_reps_are_not_tracked() {
        let (_ledger, reps) = setup(0);
        reps.observe(&rep(9), Instant::now());
        assert_eq!(reps.online_count(), 0);
    }

    #[test]
    fn stale_reps_are_dropped_on_sample() {
        let (ledger, reps) = setup(0);
        ledger.rep_weights().add(&rep(1), Amount::raw(100));
        ledger.rep_weights().add(&rep(2), Amount::raw(200));
        let start = Instant::now();
        reps.observe(&rep(1), start);
        reps.observe(&rep(2), start + Duration::from_secs(200));
        reps.sample(start + Duration::from_secs(400));
        assert!(!reps.is_online(&rep(1)));
        assert!(reps.is_online(&rep(2)));
        assert_eq!(reps.online(), Amount::raw(200));
    }

    #[test]
    fn trend_initializes_then_decays_slowly() {
        let (ledger, reps) = setup(0);
        ledger.rep_weights().add(&rep(1), Amount::raw(1_000_000));
        ledger.rep_weights().add(&rep(2), Amount::raw(500_000));
        let start = Instant::now();
        reps.observe(&rep(1), start);
        reps.sample(start);
        assert_eq!(reps.trended(), Amount::raw(1_000_000));

        // rep 1 goes quiet, rep 2 takes over with half the weight
        reps.observe(&rep(2), start + Duration::from_secs(301));
        reps.sample(start + Duration::from_secs(301));
        // 1_000_000 * 95/100 + 500_000 * 5/100
        assert_eq!(reps.trended(), Amount::raw(975_000));
    }

    #[test]
    fn delta_uses_floor_when_nobody_is_online() {
        let (_ledger, reps) = setup(1000);
        assert_eq!(reps.delta(), Amount::raw(670));
        assert_eq!(reps.trended(), Amount::raw(1000));
    }

    #[test]
    fn delta_uses_current_when_highest() {
        let (ledger, reps) = setup(100);
        ledger.rep_weights().add(&rep(1), Amount::raw(10_000));
        reps.observe(&rep(1), Instant::now());
        assert_eq!(reps.delta(), Amount::raw(6_700));
    }

    #[test]
    fn principal_weight_is_a_thousandth_of_trended() {
        let (_ledger, reps) = setup(1_000_000);
        assert_eq!(reps.minimum_principal_weight(), Amount::raw(1_000));
    }
}
