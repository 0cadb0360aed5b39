//! The ledger: account chains on top of an abstract store.

use std::sync::Arc;

use orv_store::{AccountInfo, LedgerStore, PendingInfo, PendingKey, WriteTxn};
use orv_types::{
    Account, Amount, Block, BlockHash, BlockSideband, BlockType, ConfirmationHeightInfo, Link,
};
use tracing::{debug, error, info};

use crate::{LedgerCache, LedgerConstants, LedgerError, RepWeights, WriteQueue, Writer};

/// Outcome of [`Ledger::process`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockStatus {
    /// Appended to the account chain.
    Progress,
    /// Already in the ledger.
    Old,
    /// `previous` is unknown.
    GapPrevious,
    /// The send pocketed by a receive/open is unknown.
    GapSource,
    /// Another block already occupies this chain position.
    Fork,
    /// A send that does not decrease the balance.
    NegativeSpend,
    /// Balance does not match what the block type implies.
    BalanceMismatch,
    /// The referenced send is not pending for this account.
    Unreceivable,
    /// Epoch block without the network's epoch link.
    BadEpochLink,
    /// Block type does not fit its chain position.
    BlockPosition,
}

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    pub constants: LedgerConstants,
    cache: LedgerCache,
    rep_weights: RepWeights,
    write_queue: Arc<WriteQueue>,
}

impl Ledger {
    /// Open the ledger, seeding genesis into an empty store.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        constants: LedgerConstants,
    ) -> Result<Self, LedgerError> {
        let ledger = Self {
            store,
            constants,
            cache: LedgerCache::default(),
            rep_weights: RepWeights::new(),
            write_queue: Arc::new(WriteQueue::new()),
        };
        if ledger.store.block_count()? == 0 {
            ledger.seed_genesis()?;
        }
        ledger.load_cache()?;
        Ok(ledger)
    }

    fn seed_genesis(&self) -> Result<(), LedgerError> {
        let mut genesis = self.constants.genesis_block.clone();
        genesis.set_sideband(BlockSideband {
            height: 1,
            successor: BlockHash::ZERO,
        });
        let account = genesis.account();
        let info = AccountInfo {
            head: genesis.hash(),
            open_block: genesis.hash(),
            representative: genesis.representative(),
            balance: genesis.balance(),
            block_count: 1,
            epoch: 0,
        };
        let mut txn = self.store.begin_write();
        txn.put_block(&genesis.hash(), &encode(&genesis)?)?;
        txn.put_account(&account, &info)?;
        txn.put_confirmation_height(&account, &ConfirmationHeightInfo::new(1, genesis.hash()))?;
        txn.commit()?;
        info!(genesis = %genesis.hash(), network = self.constants.network.as_str(), "seeded genesis");
        Ok(())
    }

    fn load_cache(&self) -> Result<(), LedgerError> {
        let accounts = self.store.iter_accounts()?;
        self.rep_weights
            .rebuild(accounts.iter().map(|(_, info)| (info.representative, info.balance)));
        let cemented: u64 = self
            .store
            .iter_confirmation_heights()?
            .iter()
            .map(|(_, info)| info.height)
            .sum();
        self.cache.reset(self.store.block_count()?, accounts.len() as u64, cemented);
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn write_queue(&self) -> &Arc<WriteQueue> {
        &self.write_queue
    }

    pub fn cache(&self) -> &LedgerCache {
        &self.cache
    }

    pub fn rep_weights(&self) -> &RepWeights {
        &self.rep_weights
    }

    /// Voting weight delegated to `rep`.
    pub fn weight(&self, rep: &Account) -> Amount {
        self.rep_weights.weight(rep)
    }

    pub fn block(&self, hash: &BlockHash) -> Result<Option<Block>, LedgerError> {
        match self.store.get_block(hash)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn block_exists(&self, hash: &BlockHash) -> Result<bool, LedgerError> {
        Ok(self.store.block_exists(hash)?)
    }

    pub fn account_info(&self, account: &Account) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(self.store.get_account(account)?)
    }

    pub fn account_head(&self, account: &Account) -> Result<Option<BlockHash>, LedgerError> {
        Ok(self.account_info(account)?.map(|info| info.head))
    }

    pub fn account_balance(&self, account: &Account) -> Result<Amount, LedgerError> {
        Ok(self
            .account_info(account)?
            .map(|info| info.balance)
            .unwrap_or_default())
    }

    /// Cemented position of `account`; height 0 when nothing is cemented.
    pub fn confirmation_height(
        &self,
        account: &Account,
    ) -> Result<ConfirmationHeightInfo, LedgerError> {
        Ok(self
            .store
            .get_confirmation_height(account)?
            .unwrap_or_default())
    }

    pub fn pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, LedgerError> {
        Ok(self.store.get_pending(key)?)
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        *link == self.constants.epoch_link
    }

    /// Whether `hash` is at or below its account's cemented height.
    pub fn block_confirmed(&self, hash: &BlockHash) -> Result<bool, LedgerError> {
        match self.block(hash)? {
            Some(block) => {
                let info = self.confirmation_height(&block.account())?;
                Ok(block.height() <= info.height)
            }
            None => Ok(false),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.cache.block_count()
    }

    pub fn cemented_count(&self) -> u64 {
        self.cache.cemented_count()
    }

    pub fn account_count(&self) -> u64 {
        self.cache.account_count()
    }

    /// Stage a confirmation height advance for `account`.
    ///
    /// `current` is the height the caller observed; a non-increasing update
    /// is rejected and returns `false` without staging anything.
    pub fn write_confirmation_height(
        &self,
        txn: &mut dyn WriteTxn,
        account: &Account,
        current: &ConfirmationHeightInfo,
        new: &ConfirmationHeightInfo,
    ) -> Result<bool, LedgerError> {
        if new.height <= current.height {
            debug_assert!(
                false,
                "confirmation height for {account} would move from {} to {}",
                current.height,
                new.height
            );
            error!(
                %account,
                current = current.height,
                new = new.height,
                "refusing non-increasing confirmation height"
            );
            return Ok(false);
        }
        txn.put_confirmation_height(account, new)?;
        Ok(true)
    }

    /// Record `count` newly cemented blocks after their transaction committed.
    pub fn add_cemented(&self, count: u64) {
        self.cache.add_cemented(count);
    }

    /// Validate `block` and append it to its account chain.
    pub fn process(&self, block: &Block) -> Result<BlockStatus, LedgerError> {
        let _guard = self.write_queue.wait(Writer::ProcessBatch);

        let hash = block.hash();
        if self.block_exists(&hash)? {
            return Ok(BlockStatus::Old);
        }

        let account = block.account();
        let prior = self.account_info(&account)?;
        let height = if block.is_open() {
            if block.block_type() != BlockType::Open {
                return Ok(BlockStatus::BlockPosition);
            }
            if prior.is_some() {
                return Ok(BlockStatus::Fork);
            }
            1
        } else {
            let Some(previous) = self.block(&block.previous())? else {
                return Ok(BlockStatus::GapPrevious);
            };
            if block.block_type() == BlockType::Open || previous.account() != account {
                return Ok(BlockStatus::BlockPosition);
            }
            let Some(prior) = prior.as_ref() else {
                return Err(LedgerError::AccountNotFound(account));
            };
            if prior.head != block.previous() {
                return Ok(BlockStatus::Fork);
            }
            prior.block_count + 1
        };
        let previous_balance = prior.as_ref().map(|i| i.balance).unwrap_or_default();

        let mut pending_created = None;
        let mut pending_consumed = None;
        match block.block_type() {
            BlockType::Send => {
                if block.balance() >= previous_balance {
                    return Ok(BlockStatus::NegativeSpend);
                }
                let destination = block.link().as_account();
                pending_created = Some((
                    PendingKey::new(destination, hash),
                    PendingInfo {
                        source: account,
                        amount: previous_balance - block.balance(),
                        epoch: prior.as_ref().map(|i| i.epoch).unwrap_or(0),
                    },
                ));
            }
            BlockType::Receive | BlockType::Open => {
                let source = block.link().as_block_hash();
                if !self.block_exists(&source)? {
                    return Ok(BlockStatus::GapSource);
                }
                let key = PendingKey::new(account, source);
                let Some(pending) = self.pending(&key)? else {
                    return Ok(BlockStatus::Unreceivable);
                };
                if previous_balance.checked_add(pending.amount) != Some(block.balance()) {
                    return Ok(BlockStatus::BalanceMismatch);
                }
                pending_consumed = Some(key);
            }
            BlockType::Change => {
                if block.balance() != previous_balance {
                    return Ok(BlockStatus::BalanceMismatch);
                }
            }
            BlockType::Epoch => {
                if !self.is_epoch_link(&block.link()) {
                    return Ok(BlockStatus::BadEpochLink);
                }
                if block.balance() != previous_balance {
                    return Ok(BlockStatus::BalanceMismatch);
                }
            }
        }

        let mut stored = block.clone();
        stored.set_sideband(BlockSideband {
            height,
            successor: BlockHash::ZERO,
        });
        let info = AccountInfo {
            head: hash,
            open_block: prior.as_ref().map(|i| i.open_block).unwrap_or(hash),
            representative: block.representative(),
            balance: block.balance(),
            block_count: height,
            epoch: prior.as_ref().map(|i| i.epoch).unwrap_or(0)
                + u8::from(block.block_type() == BlockType::Epoch),
        };

        let mut txn = self.store.begin_write();
        txn.put_block(&hash, &encode(&stored)?)?;
        if !block.is_open() {
            let mut previous = self
                .block(&block.previous())?
                .ok_or(LedgerError::MissingBlock(block.previous()))?;
            previous.set_sideband(BlockSideband {
                height: previous.height(),
                successor: hash,
            });
            txn.put_block(&previous.hash(), &encode(&previous)?)?;
        }
        txn.put_account(&account, &info)?;
        if let Some((key, pending)) = &pending_created {
            txn.put_pending(key, pending)?;
        }
        if let Some(key) = &pending_consumed {
            txn.delete_pending(key)?;
        }
        txn.commit()?;

        self.cache.inc_block_count();
        if prior.is_none() {
            self.cache.inc_account_count();
        }
        if let Some(prior) = &prior {
            self.rep_weights.sub(&prior.representative, prior.balance);
        }
        self.rep_weights.add(&info.representative, info.balance);

        debug!(%hash, %account, height, block_type = ?block.block_type(), "block processed");
        Ok(BlockStatus::Progress)
    }
}

fn encode(block: &Block) -> Result<Vec<u8>, LedgerError> {
    bincode::serialize(block).map_err(|e| LedgerError::Encoding(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Block, LedgerError> {
    bincode::deserialize(bytes).map_err(|e| LedgerError::Encoding(e.to_string()))
}
