//! Builds valid successor blocks from the ledger's current state.
//!
//! The factory only constructs blocks; nothing is written until the caller
//! hands the block to [`Ledger::process`](crate::Ledger::process).

use orv_types::{Account, Amount, Block, BlockHash, BlockType, Link};

use crate::{Ledger, LedgerError};

pub struct BlockFactory<'a> {
    ledger: &'a Ledger,
}

impl<'a> BlockFactory<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Send `amount` from the head of `from` to `to`.
    pub fn send(&self, from: Account, to: Account, amount: Amount) -> Result<Block, LedgerError> {
        let info = self
            .ledger
            .account_info(&from)?
            .ok_or(LedgerError::AccountNotFound(from))?;
        Ok(Block::new(
            BlockType::Send,
            from,
            info.head,
            info.representative,
            info.balance.saturating_sub(amount),
            Link::from(to),
        ))
    }

    /// Open `account` by pocketing `send_hash`, delegating to `representative`.
    pub fn open(
        &self,
        account: Account,
        send_hash: BlockHash,
        representative: Account,
    ) -> Result<Block, LedgerError> {
        let amount = self.pending_amount(account, send_hash)?;
        Ok(Block::new(
            BlockType::Open,
            account,
            BlockHash::ZERO,
            representative,
            amount,
            Link::from(send_hash),
        ))
    }

    /// Pocket `send_hash` into an already opened `account`.
    pub fn receive(&self, account: Account, send_hash: BlockHash) -> Result<Block, LedgerError> {
        let info = self
            .ledger
            .account_info(&account)?
            .ok_or(LedgerError::AccountNotFound(account))?;
        let amount = self.pending_amount(account, send_hash)?;
        Ok(Block::new(
            BlockType::Receive,
            account,
            info.head,
            info.representative,
            info.balance.saturating_add(amount),
            Link::from(send_hash),
        ))
    }

    pub fn change(&self, account: Account, representative: Account) -> Result<Block, LedgerError> {
        let info = self
            .ledger
            .account_info(&account)?
            .ok_or(LedgerError::AccountNotFound(account))?;
        Ok(Block::new(
            BlockType::Change,
            account,
            info.head,
            representative,
            info.balance,
            Link::ZERO,
        ))
    }

    fn pending_amount(&self, account: Account, send_hash: BlockHash) -> Result<Amount, LedgerError> {
        let key = orv_store::PendingKey::new(account, send_hash);
        Ok(self
            .ledger
            .pending(&key)?
            .map(|pending| pending.amount)
            .unwrap_or_default())
    }
}
