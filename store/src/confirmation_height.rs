//! Confirmation height storage trait.

use crate::StoreError;
use orv_types::{Account, ConfirmationHeightInfo};

pub trait ConfirmationHeightStore {
    /// `None` when nothing of the account chain has been cemented.
    fn get_confirmation_height(
        &self,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError>;

    /// Number of accounts with a confirmation height entry.
    fn confirmation_height_count(&self) -> Result<u64, StoreError>;

    fn iter_confirmation_heights(
        &self,
    ) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError>;
}
