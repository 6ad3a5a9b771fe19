use axum::{http::StatusCode, response::Json};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::money::{format_money, max_balance};
use crate::models::AmountError;

pub type Result<T> = std::result::Result<T, LedgerError>;

fn money(value: &Decimal) -> String {
    format_money(*value)
}

/// Failures of the storage layer itself, never business rules.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out waiting for wallet lock")]
    LockTimeout,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Lock waits and deadlocks are worth retrying by the caller; the rest usually are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout)
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("\"{0}\" is not a valid choice")]
    InvalidOperationType(String),
    #[error("{reason}")]
    MalformedAmount {
        field: &'static str,
        reason: AmountError,
    },
    #[error("Amount cannot be negative")]
    NegativeAmount,
    #[error("Amount cannot be zero")]
    ZeroAmount,
    #[error("Insufficient funds, available {}", money(.available))]
    InsufficientFunds { available: Decimal },
    #[error("Wallet not found")]
    WalletNotFound,
    #[error("Balance cannot be negative")]
    NegativeBalance,
    #[error("Balance cannot exceed {}", format_money(max_balance()))]
    BalanceLimitExceeded { balance: Decimal },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl LedgerError {
    /// Map an amount parse failure for an operation `amount` field.
    pub fn from_amount(reason: AmountError) -> Self {
        match reason {
            AmountError::Negative => LedgerError::NegativeAmount,
            AmountError::Zero => LedgerError::ZeroAmount,
            reason => LedgerError::MalformedAmount { field: "amount", reason },
        }
    }

    /// Map a parse failure for a wallet's seed `balance`. Zero is a valid seed.
    pub fn from_balance(reason: AmountError) -> Self {
        match reason {
            AmountError::Negative => LedgerError::NegativeBalance,
            reason => LedgerError::MalformedAmount { field: "balance", reason },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidOperationType(_) => "INVALID_OPERATION_TYPE",
            LedgerError::MalformedAmount { .. } => "MALFORMED_AMOUNT",
            LedgerError::NegativeAmount => "NEGATIVE_AMOUNT",
            LedgerError::ZeroAmount => "ZERO_AMOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::WalletNotFound => "WALLET_NOT_FOUND",
            LedgerError::NegativeBalance => "NEGATIVE_BALANCE",
            LedgerError::BalanceLimitExceeded { .. } => "BALANCE_LIMIT_EXCEEDED",
            LedgerError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// The request field a validation error belongs to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            LedgerError::InvalidOperationType(_) => Some("operation_type"),
            LedgerError::MalformedAmount { field, .. } => Some(*field),
            LedgerError::NegativeAmount | LedgerError::ZeroAmount => Some("amount"),
            LedgerError::NegativeBalance => Some("balance"),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::WalletNotFound => StatusCode::NOT_FOUND,
            LedgerError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Handler-facing form: `{"error", "code", ...context}` with the matching status.
    pub fn into_http(self) -> (StatusCode, Json<serde_json::Value>) {
        let status = self.status();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let Some(field) = self.field() {
            body["field"] = serde_json::json!(field);
        }
        match &self {
            LedgerError::InsufficientFunds { available } => {
                body["available_balance"] = serde_json::json!(format_money(*available));
            }
            LedgerError::BalanceLimitExceeded { balance } => {
                body["balance"] = serde_json::json!(format_money(*balance));
            }
            LedgerError::StorageUnavailable(e) => {
                tracing::error!("Storage failure: {:?}", e);
                // Internal details stay in the log
                body["error"] = serde_json::json!("Storage unavailable, try again later");
                body["transient"] = serde_json::json!(e.is_transient());
            }
            _ => {}
        }

        (status, Json(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_carries_structured_balance() {
        let (status, Json(body)) = LedgerError::InsufficientFunds { available: dec!(1000) }.into_http();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
        assert_eq!(body["available_balance"], "1000.00");
        assert_eq!(body["error"], "Insufficient funds, available 1000.00");
    }

    #[test]
    fn validation_errors_name_their_field() {
        let (_, Json(body)) = LedgerError::NegativeAmount.into_http();
        assert_eq!(body["field"], "amount");
        assert_eq!(body["error"], "Amount cannot be negative");

        let (_, Json(body)) = LedgerError::InvalidOperationType("INVALID".into()).into_http();
        assert_eq!(body["field"], "operation_type");
        assert!(body["error"].as_str().unwrap().contains("is not a valid choice"));
    }

    #[test]
    fn amount_errors_split_by_kind() {
        assert!(matches!(LedgerError::from_amount(AmountError::Zero), LedgerError::ZeroAmount));
        assert!(matches!(LedgerError::from_amount(AmountError::Negative), LedgerError::NegativeAmount));
        assert!(matches!(
            LedgerError::from_amount(AmountError::NotANumber),
            LedgerError::MalformedAmount { field: "amount", .. }
        ));
        assert!(matches!(LedgerError::from_balance(AmountError::Negative), LedgerError::NegativeBalance));
    }

    #[test]
    fn storage_failures_are_not_business_errors() {
        let err = LedgerError::from(StoreError::LockTimeout);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let (_, Json(body)) = err.into_http();
        assert_eq!(body["code"], "STORAGE_UNAVAILABLE");
        assert_eq!(body["transient"], true);
        assert_eq!(LedgerError::WalletNotFound.status(), StatusCode::NOT_FOUND);
    }
}
