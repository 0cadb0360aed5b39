//! Account identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::hash::bytes32! {
    /// A 32-byte account identifier (the account's public key).
    ///
    /// Representatives are accounts too: every account delegates its balance
    /// to one representative account, whose voting weight is the sum of all
    /// balances delegated to it.
    Account
}

impl Account {
    /// Address form used in logs, e.g. `orv_0000..01`.
    pub fn encode_account(&self) -> String {
        format!("orv_{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_account_has_prefix() {
        let account = Account::from_u64(1);
        let encoded = account.encode_account();
        assert!(encoded.starts_with("orv_"));
        assert!(encoded.ends_with("01"));
        assert_eq!(encoded.len(), 4 + 64);
    }

    #[test]
    fn accounts_are_ordered_bytewise() {
        assert!(Account::from_u64(1) < Account::from_u64(2));
    }
}
