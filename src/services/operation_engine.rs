//! Operation Engine: validates a money movement, then applies it inside one store transaction
//! that holds the wallet's exclusive lock from read to write.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::models::money::{max_balance, parse_decimal};
use crate::models::{Amount, Operation, OperationType, Wallet, WalletId};
use crate::services::ledger_store::{LedgerStore, LedgerTransaction};

/// A deposit/withdraw request that passed validation. Built only by `validate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationRequest {
    pub operation_type: OperationType,
    pub amount: Amount,
}

impl OperationRequest {
    /// Ordered checks, first failure wins: operation type, amount format/precision, amount sign.
    pub fn validate(operation_type: &str, amount: &str) -> Result<Self> {
        let operation_type = OperationType::parse(operation_type)
            .ok_or_else(|| LedgerError::InvalidOperationType(operation_type.to_string()))?;
        let amount = Amount::parse(amount).map_err(LedgerError::from_amount)?;

        Ok(Self { operation_type, amount })
    }
}

#[derive(Clone)]
pub struct OperationEngine<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> OperationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a wallet with a fresh id. `initial_balance` defaults to zero and must not be negative.
    pub async fn create_wallet(&self, initial_balance: Option<&str>) -> Result<Wallet> {
        let balance = match initial_balance {
            Some(raw) => parse_decimal(raw).map_err(LedgerError::from_balance)?,
            None => Decimal::ZERO,
        };
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance);
        }

        let wallet = Wallet::new(balance);
        self.store.create_wallet(&wallet).await?;
        tracing::info!("Created wallet {} with balance {}", wallet.id, wallet.balance);

        Ok(wallet)
    }

    pub async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        self.store
            .get_wallet(wallet_id)
            .await?
            .ok_or(LedgerError::WalletNotFound)
    }

    pub async fn history(&self, wallet_id: WalletId) -> Result<Vec<Operation>> {
        self.get_wallet(wallet_id).await?;
        Ok(self.store.operations_for_wallet(wallet_id).await?)
    }

    /// Validate raw input, then apply. Nothing touches storage unless validation passes.
    pub async fn apply_operation(&self, wallet_id: WalletId, operation_type: &str, amount: &str) -> Result<Wallet> {
        let request = OperationRequest::validate(operation_type, amount).map_err(|e| {
            tracing::warn!("Rejected operation on wallet {}: {}", wallet_id, e);
            e
        })?;
        self.apply(wallet_id, request).await
    }

    /// Lock the wallet, compute the new balance, persist wallet and operation record, commit.
    /// Any failure before commit drops the transaction, which rolls it back.
    pub async fn apply(&self, wallet_id: WalletId, request: OperationRequest) -> Result<Wallet> {
        let OperationRequest { operation_type, amount } = request;

        let mut tx = self.store.begin().await?;
        let Some(mut wallet) = tx.lock_and_fetch(wallet_id).await? else {
            tracing::warn!("Rejected {} {}: wallet {} not found", operation_type, amount, wallet_id);
            return Err(LedgerError::WalletNotFound);
        };

        let new_balance = operation_type.apply_to(wallet.balance, amount);
        if new_balance < Decimal::ZERO {
            release(tx, wallet_id).await;
            tracing::warn!(
                "Insufficient funds on wallet {}: {} {} against {}",
                wallet_id,
                operation_type,
                amount,
                wallet.balance
            );
            return Err(LedgerError::InsufficientFunds { available: wallet.balance });
        }
        if new_balance > max_balance() {
            release(tx, wallet_id).await;
            tracing::warn!(
                "Balance limit on wallet {}: {} {} against {}",
                wallet_id,
                operation_type,
                amount,
                wallet.balance
            );
            return Err(LedgerError::BalanceLimitExceeded { balance: wallet.balance });
        }

        let now = Utc::now();
        wallet.balance = new_balance;
        wallet.updated_at = now;
        let operation = Operation::new(wallet_id, operation_type, amount, now);

        tx.save(&wallet, &operation).await?;
        tx.commit().await?;

        tracing::info!(
            "Applied {} {} to wallet {}, balance now {}",
            operation_type,
            amount,
            wallet_id,
            wallet.balance
        );

        Ok(wallet)
    }
}

/// Roll back a rejected operation. The rejection stands even if the rollback fails; the
/// transaction is dropped either way, which releases the lock.
async fn release<T: LedgerTransaction>(tx: T, wallet_id: WalletId) {
    if let Err(e) = tx.rollback().await {
        tracing::error!("Rollback failed on wallet {}: {:?}", wallet_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::AmountError;
    use crate::services::memory_store::{MemoryLedgerStore, MemoryLedgerTx};
    use rust_decimal_macros::dec;

    /// Memory store whose transactions always fail to roll back.
    #[derive(Clone, Default)]
    struct BrokenRollbackStore(MemoryLedgerStore);

    struct BrokenRollbackTx(MemoryLedgerTx);

    impl LedgerStore for BrokenRollbackStore {
        type Tx = BrokenRollbackTx;

        async fn create_wallet(&self, wallet: &Wallet) -> std::result::Result<(), StoreError> {
            self.0.create_wallet(wallet).await
        }

        async fn get_wallet(&self, id: WalletId) -> std::result::Result<Option<Wallet>, StoreError> {
            self.0.get_wallet(id).await
        }

        async fn operations_for_wallet(&self, id: WalletId) -> std::result::Result<Vec<Operation>, StoreError> {
            self.0.operations_for_wallet(id).await
        }

        async fn begin(&self) -> std::result::Result<Self::Tx, StoreError> {
            Ok(BrokenRollbackTx(self.0.begin().await?))
        }
    }

    impl LedgerTransaction for BrokenRollbackTx {
        async fn lock_and_fetch(&mut self, id: WalletId) -> std::result::Result<Option<Wallet>, StoreError> {
            self.0.lock_and_fetch(id).await
        }

        async fn save(&mut self, wallet: &Wallet, operation: &Operation) -> std::result::Result<(), StoreError> {
            self.0.save(wallet, operation).await
        }

        async fn commit(self) -> std::result::Result<(), StoreError> {
            self.0.commit().await
        }

        async fn rollback(self) -> std::result::Result<(), StoreError> {
            drop(self.0);
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
    }

    fn engine() -> OperationEngine<MemoryLedgerStore> {
        OperationEngine::new(MemoryLedgerStore::default())
    }

    #[test]
    fn validation_checks_type_before_amount() {
        let err = OperationRequest::validate("INVALID", "-1").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOperationType(ref t) if t == "INVALID"));
    }

    #[test]
    fn validation_separates_negative_zero_and_malformed() {
        assert!(matches!(
            OperationRequest::validate("DEPOSIT", "-500.00"),
            Err(LedgerError::NegativeAmount)
        ));
        assert!(matches!(
            OperationRequest::validate("DEPOSIT", "0.00"),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(matches!(
            OperationRequest::validate("DEPOSIT", "ten"),
            Err(LedgerError::MalformedAmount { reason: AmountError::NotANumber, .. })
        ));
        let ok = OperationRequest::validate("WITHDRAW", "12.5").unwrap();
        assert_eq!(ok.operation_type, OperationType::Withdraw);
        assert_eq!(ok.amount.value(), dec!(12.50));
    }

    #[tokio::test]
    async fn create_wallet_defaults_to_zero_and_rejects_negative_seed() {
        let engine = engine();
        assert_eq!(engine.create_wallet(None).await.unwrap().balance, dec!(0));
        assert_eq!(engine.create_wallet(Some("0")).await.unwrap().balance, dec!(0));
        assert!(matches!(
            engine.create_wallet(Some("-1.00")).await,
            Err(LedgerError::NegativeBalance)
        ));
        assert!(matches!(
            engine.create_wallet(Some("1.001")).await,
            Err(LedgerError::MalformedAmount { field: "balance", .. })
        ));
    }

    #[tokio::test]
    async fn deposit_and_withdraw_update_balance_and_record_operation() {
        let engine = engine();
        let wallet = engine.create_wallet(Some("1000.00")).await.unwrap();

        let after = engine.apply_operation(wallet.id, "DEPOSIT", "500.00").await.unwrap();
        assert_eq!(after.balance, dec!(1500.00));
        assert!(after.updated_at >= wallet.updated_at);

        let after = engine.apply_operation(wallet.id, "WITHDRAW", "1500.00").await.unwrap();
        assert_eq!(after.balance, dec!(0.00));

        let history = engine.history(wallet.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation_type, OperationType::Deposit);
        assert_eq!(history[0].amount.value(), dec!(500.00));
        assert_eq!(history[1].operation_type, OperationType::Withdraw);
        assert!(history.iter().all(|op| op.wallet_id == wallet.id));
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_no_trace() {
        let engine = engine();
        let wallet = engine.create_wallet(Some("1000.00")).await.unwrap();

        let err = engine
            .apply_operation(wallet.id, "WITHDRAW", "5000.00")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { available } if available == dec!(1000.00)));

        assert_eq!(engine.get_wallet(wallet.id).await.unwrap().balance, dec!(1000.00));
        assert!(engine.history(wallet.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deposit_past_column_capacity_is_rejected() {
        let engine = engine();
        let wallet = engine.create_wallet(Some("9999999999.00")).await.unwrap();
        let err = engine.apply_operation(wallet.id, "DEPOSIT", "1.00").await.unwrap_err();
        assert!(matches!(err, LedgerError::BalanceLimitExceeded { .. }));
        assert_eq!(engine.get_wallet(wallet.id).await.unwrap().balance, dec!(9999999999.00));
    }

    #[tokio::test]
    async fn unknown_wallet_is_not_found() {
        let engine = engine();
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            engine.apply_operation(missing, "DEPOSIT", "1.00").await,
            Err(LedgerError::WalletNotFound)
        ));
        assert!(matches!(engine.get_wallet(missing).await, Err(LedgerError::WalletNotFound)));
        assert!(matches!(engine.history(missing).await, Err(LedgerError::WalletNotFound)));
    }

    #[tokio::test]
    async fn validation_failure_beats_missing_wallet() {
        let engine = engine();
        assert!(matches!(
            engine.apply_operation(uuid::Uuid::new_v4(), "DEPOSIT", "0").await,
            Err(LedgerError::ZeroAmount)
        ));
    }

    #[tokio::test]
    async fn failed_rollback_keeps_business_rejection() {
        let engine = OperationEngine::new(BrokenRollbackStore::default());
        let wallet = engine.create_wallet(Some("10.00")).await.unwrap();

        let err = engine.apply_operation(wallet.id, "WITHDRAW", "20.00").await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { available } if available == dec!(10.00)));

        let rich = engine.create_wallet(Some("9999999999.99")).await.unwrap();
        let err = engine.apply_operation(rich.id, "DEPOSIT", "0.01").await.unwrap_err();
        assert!(matches!(err, LedgerError::BalanceLimitExceeded { .. }));

        // The lock went with the dropped transaction
        let after = engine.apply_operation(wallet.id, "DEPOSIT", "1.00").await.unwrap();
        assert_eq!(after.balance, dec!(11.00));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn business_rejections_log_warnings() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let engine = engine();
        let request = OperationRequest::validate("DEPOSIT", "1.00").unwrap();
        let missing = uuid::Uuid::new_v4();
        assert!(engine.apply(missing, request).await.is_err());

        let full = engine.create_wallet(Some("9999999999.99")).await.unwrap();
        assert!(engine.apply(full.id, request).await.is_err());

        let text = logs.text();
        assert!(text.contains("WARN"));
        assert!(text.contains(&format!("wallet {} not found", missing)));
        assert!(text.contains(&format!("Balance limit on wallet {}", full.id)));
    }
}
