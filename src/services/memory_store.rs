//! In-process Ledger Store. Each wallet has its own async mutex; a transaction owns the guard
//! from `lock_and_fetch` until it ends, which gives the same serialization as a row lock.
//! Writes are staged and only published on commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::StoreError;
use crate::models::{Operation, Wallet, WalletId};
use crate::services::ledger_store::{LedgerStore, LedgerTransaction};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

struct WalletSlot {
    lock: Arc<Mutex<()>>,
    committed: RwLock<Wallet>,
}

struct Inner {
    wallets: RwLock<HashMap<WalletId, Arc<WalletSlot>>>,
    operations: RwLock<Vec<Operation>>,
    lock_timeout: Duration,
}

#[derive(Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<Inner>,
}

impl MemoryLedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                wallets: RwLock::new(HashMap::new()),
                operations: RwLock::new(Vec::new()),
                lock_timeout,
            }),
        }
    }

    async fn slot(&self, id: WalletId) -> Option<Arc<WalletSlot>> {
        self.inner.wallets.read().await.get(&id).cloned()
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn create_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut wallets = self.inner.wallets.write().await;
        if wallets.contains_key(&wallet.id) {
            return Err(StoreError::Unavailable(format!("wallet {} already exists", wallet.id)));
        }
        wallets.insert(
            wallet.id,
            Arc::new(WalletSlot {
                lock: Arc::new(Mutex::new(())),
                committed: RwLock::new(wallet.clone()),
            }),
        );
        Ok(())
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.committed.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn operations_for_wallet(&self, id: WalletId) -> Result<Vec<Operation>, StoreError> {
        let operations = self.inner.operations.read().await;
        Ok(operations.iter().filter(|op| op.wallet_id == id).cloned().collect())
    }

    async fn begin(&self) -> Result<MemoryLedgerTx, StoreError> {
        Ok(MemoryLedgerTx {
            store: self.clone(),
            held: HashMap::new(),
            staged_operations: Vec::new(),
        })
    }
}

struct HeldWallet {
    slot: Arc<WalletSlot>,
    staged: Option<Wallet>,
    _guard: OwnedMutexGuard<()>,
}

/// Holds wallet guards until dropped; dropping without `commit` discards staged writes.
pub struct MemoryLedgerTx {
    store: MemoryLedgerStore,
    held: HashMap<WalletId, HeldWallet>,
    staged_operations: Vec<Operation>,
}

impl LedgerTransaction for MemoryLedgerTx {
    async fn lock_and_fetch(&mut self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        if let Some(held) = self.held.get(&id) {
            let current = match &held.staged {
                Some(wallet) => wallet.clone(),
                None => held.slot.committed.read().await.clone(),
            };
            return Ok(Some(current));
        }

        let Some(slot) = self.store.slot(id).await else {
            return Ok(None);
        };

        let guard = tokio::time::timeout(self.store.inner.lock_timeout, slot.lock.clone().lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!("Lock wait on wallet {} exceeded {:?}", id, self.store.inner.lock_timeout);
                StoreError::LockTimeout
            })?;

        let wallet = slot.committed.read().await.clone();
        self.held.insert(
            id,
            HeldWallet {
                slot,
                staged: None,
                _guard: guard,
            },
        );
        Ok(Some(wallet))
    }

    async fn save(&mut self, wallet: &Wallet, operation: &Operation) -> Result<(), StoreError> {
        let held = self.held.get_mut(&wallet.id).ok_or_else(|| {
            StoreError::Unavailable(format!("wallet {} is not locked by this transaction", wallet.id))
        })?;
        held.staged = Some(wallet.clone());
        self.staged_operations.push(operation.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let MemoryLedgerTx {
            store,
            held,
            staged_operations,
        } = self;

        let mut operations = store.inner.operations.write().await;
        for (_, held) in held.iter() {
            if let Some(wallet) = &held.staged {
                *held.slot.committed.write().await = wallet.clone();
            }
        }
        operations.extend(staged_operations);
        drop(operations);

        // guards released here
        drop(held);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
