//! Nullable store: thread-safe in-memory ledger storage for testing.

use orv_store::{
    AccountInfo, AccountStore, BlockStore, ConfirmationHeightStore, LedgerStore, PendingInfo,
    PendingKey, PendingStore, StoreError, WriteTxn,
};
use orv_types::{Account, BlockHash, ConfirmationHeightInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    blocks: HashMap<BlockHash, Vec<u8>>,
    accounts: HashMap<Account, AccountInfo>,
    pending: HashMap<PendingKey, PendingInfo>,
    confirmation_heights: HashMap<Account, ConfirmationHeightInfo>,
}

/// An in-memory store implementing every ledger table.
///
/// Writes staged in a [`NullWriteTxn`] are applied under one lock on commit,
/// so readers never observe a half-applied transaction.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    commits: AtomicUsize,
    confirmation_height_writes: AtomicUsize,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed write transactions that changed anything.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of confirmation height rows written by committed transactions.
    pub fn confirmation_height_writes(&self) -> usize {
        self.confirmation_height_writes.load(Ordering::SeqCst)
    }
}

impl BlockStore for NullStore {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tables.lock().unwrap().blocks.get(hash).cloned())
    }

    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.tables.lock().unwrap().blocks.contains_key(hash))
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().blocks.len() as u64)
    }
}

impl AccountStore for NullStore {
    fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
        Ok(self.tables.lock().unwrap().accounts.get(account).cloned())
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().accounts.len() as u64)
    }

    fn iter_accounts(&self) -> Result<Vec<(Account, AccountInfo)>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .map(|(account, info)| (*account, info.clone()))
            .collect())
    }
}

impl PendingStore for NullStore {
    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
        Ok(self.tables.lock().unwrap().pending.get(key).cloned())
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().pending.len() as u64)
    }
}

impl ConfirmationHeightStore for NullStore {
    fn get_confirmation_height(
        &self,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .confirmation_heights
            .get(account)
            .copied())
    }

    fn confirmation_height_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().confirmation_heights.len() as u64)
    }

    fn iter_confirmation_heights(
        &self,
    ) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .confirmation_heights
            .iter()
            .map(|(account, info)| (*account, *info))
            .collect())
    }
}

impl LedgerStore for NullStore {
    fn begin_write(&self) -> Box<dyn WriteTxn + '_> {
        Box::new(NullWriteTxn {
            store: self,
            ops: Vec::new(),
        })
    }
}

enum WriteOp {
    PutBlock(BlockHash, Vec<u8>),
    PutAccount(Account, AccountInfo),
    PutPending(PendingKey, PendingInfo),
    DeletePending(PendingKey),
    PutConfirmationHeight(Account, ConfirmationHeightInfo),
}

/// Staged writes against a [`NullStore`].
pub struct NullWriteTxn<'a> {
    store: &'a NullStore,
    ops: Vec<WriteOp>,
}

impl WriteTxn for NullWriteTxn<'_> {
    fn put_block(&mut self, hash: &BlockHash, block_bytes: &[u8]) -> Result<(), StoreError> {
        self.ops.push(WriteOp::PutBlock(*hash, block_bytes.to_vec()));
        Ok(())
    }

    fn put_account(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        self.ops.push(WriteOp::PutAccount(*account, info.clone()));
        Ok(())
    }

    fn put_pending(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        self.ops.push(WriteOp::PutPending(*key, info.clone()));
        Ok(())
    }

    fn delete_pending(&mut self, key: &PendingKey) -> Result<(), StoreError> {
        self.ops.push(WriteOp::DeletePending(*key));
        Ok(())
    }

    fn put_confirmation_height(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        self.ops.push(WriteOp::PutConfirmationHeight(*account, *info));
        Ok(())
    }

    fn pending_ops(&self) -> usize {
        self.ops.len()
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let NullWriteTxn { store, ops } = *self;
        if ops.is_empty() {
            return Ok(());
        }
        let mut tables = store.tables.lock().unwrap();
        let mut height_writes = 0;
        for op in ops {
            match op {
                WriteOp::PutBlock(hash, bytes) => {
                    tables.blocks.insert(hash, bytes);
                }
                WriteOp::PutAccount(account, info) => {
                    tables.accounts.insert(account, info);
                }
                WriteOp::PutPending(key, info) => {
                    tables.pending.insert(key, info);
                }
                WriteOp::DeletePending(key) => {
                    tables.pending.remove(&key);
                }
                WriteOp::PutConfirmationHeight(account, info) => {
                    tables.confirmation_heights.insert(account, info);
                    height_writes += 1;
                }
            }
        }
        store.commits.fetch_add(1, Ordering::SeqCst);
        store
            .confirmation_height_writes
            .fetch_add(height_writes, Ordering::SeqCst);
        Ok(())
    }
}
