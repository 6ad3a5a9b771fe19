//! Ledger Store contract: durable wallets, append-only operations, and a transaction that holds
//! an exclusive per-wallet lock from `lock_and_fetch` until commit or rollback.
//!
//! Dropping a transaction without committing rolls it back, so a cancelled request leaves no
//! trace.

use std::future::Future;

use crate::error::StoreError;
use crate::models::{Operation, Wallet, WalletId};

pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTransaction;

    fn create_wallet(&self, wallet: &Wallet) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Unlocked read of the last committed state.
    fn get_wallet(&self, id: WalletId) -> impl Future<Output = Result<Option<Wallet>, StoreError>> + Send;

    /// Operation history for one wallet, oldest first.
    fn operations_for_wallet(
        &self,
        id: WalletId,
    ) -> impl Future<Output = Result<Vec<Operation>, StoreError>> + Send;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

pub trait LedgerTransaction: Send {
    /// Fetch a wallet and hold its exclusive lock until this transaction ends.
    /// Blocks while another transaction holds the same wallet; bounded by the store's lock timeout.
    fn lock_and_fetch(
        &mut self,
        id: WalletId,
    ) -> impl Future<Output = Result<Option<Wallet>, StoreError>> + Send;

    /// Stage the new balance and the operation record. Visible to others only after `commit`.
    fn save(
        &mut self,
        wallet: &Wallet,
        operation: &Operation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
