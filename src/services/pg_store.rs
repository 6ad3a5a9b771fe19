use std::time::Duration;

use sqlx::{Postgres, Transaction};

use crate::database::DatabasePool;
use crate::error::StoreError;
use crate::models::{Operation, Wallet, WalletId};
use crate::services::ledger_store::{LedgerStore, LedgerTransaction};

/// SQLSTATE codes that mean "could not get the row lock in time".
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some(LOCK_NOT_AVAILABLE) | Some(DEADLOCK_DETECTED)) {
            return StoreError::LockTimeout;
        }
    }
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: DatabasePool,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    pub fn new(pool: DatabasePool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn create_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#
        )
        .bind(wallet.id)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, balance, created_at, updated_at
            FROM wallets
            WHERE id = $1
            "#
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn operations_for_wallet(&self, id: WalletId) -> Result<Vec<Operation>, StoreError> {
        sqlx::query_as::<_, Operation>(
            r#"
            SELECT id, wallet_id, operation_type, amount, created_at
            FROM operations
            WHERE wallet_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        )
        .bind(id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn begin(&self) -> Result<PgLedgerTx, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Scoped to this transaction; a blocked FOR UPDATE fails with 55P03 instead of hanging
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        Ok(PgLedgerTx { tx })
    }
}

/// A Postgres transaction. Dropped without `commit`, sqlx rolls it back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl LedgerTransaction for PgLedgerTx {
    async fn lock_and_fetch(&mut self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, balance, created_at, updated_at
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)
    }

    async fn save(&mut self, wallet: &Wallet, operation: &Operation) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2, updated_at = $3
            WHERE id = $1
            "#
        )
        .bind(wallet.id)
        .bind(wallet.balance)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() != 1 {
            return Err(StoreError::Unavailable(format!(
                "wallet {} vanished inside its own transaction",
                wallet.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO operations (id, wallet_id, operation_type, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#
        )
        .bind(operation.id)
        .bind(operation.wallet_id)
        .bind(operation.operation_type.as_str())
        .bind(operation.amount.value())
        .bind(operation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_db_error)
    }
}
