//! Cached representative weights.
//!
//! A representative's weight is the sum of the balances of every account
//! that names it as representative. The cache is rebuilt once at startup
//! from the account table, then maintained incrementally as blocks change
//! balances or representatives.

use orv_types::{Account, Amount};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct RepWeights {
    weights: RwLock<HashMap<Account, Amount>>,
}

impl RepWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, rep: &Account) -> Amount {
        self.weights
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(rep)
            .copied()
            .unwrap_or_default()
    }

    /// Add delegated weight (an account now names `rep`, or its balance grew).
    pub fn add(&self, rep: &Account, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let mut weights = self.weights.write().unwrap_or_else(|e| e.into_inner());
        let entry = weights.entry(*rep).or_default();
        *entry = entry.saturating_add(amount);
    }

    /// Remove delegated weight, dropping the entry when it reaches zero.
    pub fn sub(&self, rep: &Account, amount: Amount) {
        let mut weights = self.weights.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = weights.get_mut(rep) {
            *entry = entry.saturating_sub(amount);
            if entry.is_zero() {
                weights.remove(rep);
            }
        }
    }

    /// Move `amount` of weight between representatives.
    pub fn change_rep(&self, old_rep: &Account, new_rep: &Account, amount: Amount) {
        self.sub(old_rep, amount);
        self.add(new_rep, amount);
    }

    pub fn total(&self) -> Amount {
        self.weights
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .copied()
            .sum()
    }

    /// Number of representatives holding any weight.
    pub fn len(&self) -> usize {
        self.weights.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild from `(representative, balance)` pairs.
    pub fn rebuild(&self, delegations: impl IntoIterator<Item = (Account, Amount)>) {
        let mut weights = self.weights.write().unwrap_or_else(|e| e.into_inner());
        weights.clear();
        for (rep, balance) in delegations {
            let entry = weights.entry(rep).or_default();
            *entry = entry.saturating_add(balance);
        }
        weights.retain(|_, w| !w.is_zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_account(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn add_and_weight() {
        let weights = RepWeights::new();
        weights.add(&make_account(1), Amount::raw(100));
        weights.add(&make_account(1), Amount::raw(50));
        assert_eq!(weights.weight(&make_account(1)), Amount::raw(150));
        assert_eq!(weights.weight(&make_account(2)), Amount::ZERO);
    }

    #[test]
    fn sub_to_zero_removes_entry() {
        let weights = RepWeights::new();
        weights.add(&make_account(1), Amount::raw(100));
        weights.sub(&make_account(1), Amount::raw(100));
        assert!(weights.is_empty());
    }

    #[test]
    fn change_rep_moves_weight() {
        let weights = RepWeights::new();
        weights.add(&make_account(1), Amount::raw(100));
        weights.change_rep(&make_account(1), &make_account(2), Amount::raw(40));
        assert_eq!(weights.weight(&make_account(1)), Amount::raw(60));
        assert_eq!(weights.weight(&make_account(2)), Amount::raw(40));
        assert_eq!(weights.total(), Amount::raw(100));
    }

    #[test]
    fn rebuild_replaces_contents() {
        let weights = RepWeights::new();
        weights.add(&make_account(9), Amount::raw(1));
        weights.rebuild(vec![
            (make_account(1), Amount::raw(10)),
            (make_account(1), Amount::raw(5)),
            (make_account(2), Amount::ZERO),
        ]);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights.weight(&make_account(1)), Amount::raw(15));
        assert_eq!(weights.weight(&make_account(9)), Amount::ZERO);
    }
}
