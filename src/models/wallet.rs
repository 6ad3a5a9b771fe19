use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use super::ids::{OperationId, WalletId};
use super::money::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Deposit,
    Withdraw,
}

impl OperationType {
    pub const CHOICES: [OperationType; 2] = [OperationType::Deposit, OperationType::Withdraw];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "DEPOSIT",
            OperationType::Withdraw => "WITHDRAW",
        }
    }

    /// Exact match on the wire value; "deposit" is not a valid choice.
    pub fn parse(s: &str) -> Option<Self> {
        Self::CHOICES.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Balance after applying `amount` in this direction. May be negative; callers decide.
    pub fn apply_to(&self, balance: Decimal, amount: Amount) -> Decimal {
        match self {
            OperationType::Deposit => balance + amount.value(),
            OperationType::Withdraw => balance - amount.value(),
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account holding a non-negative balance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Wallet {
    pub id: WalletId,
    #[serde(serialize_with = "crate::utils::money_serde::serialize")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for Wallet {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Immutable record of one applied deposit or withdrawal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Operation {
    pub id: OperationId,
    pub wallet_id: WalletId,
    pub operation_type: OperationType,
    #[serde(serialize_with = "crate::utils::money_serde::serialize_amount")]
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn new(wallet_id: WalletId, operation_type: OperationType, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            operation_type,
            amount,
            created_at: at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for Operation {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("operation_type")?;
        let operation_type = OperationType::parse(&kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "operation_type".to_string(),
            source: format!("unknown operation type {:?}", kind).into(),
        })?;
        let amount = Amount::try_from(row.try_get::<Decimal, _>("amount")?).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "amount".to_string(),
                source: Box::new(e),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            wallet_id: row.try_get("wallet_id")?,
            operation_type,
            amount,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn operation_type_choices_are_exact() {
        assert_eq!(OperationType::parse("DEPOSIT"), Some(OperationType::Deposit));
        assert_eq!(OperationType::parse("WITHDRAW"), Some(OperationType::Withdraw));
        assert_eq!(OperationType::parse("deposit"), None);
        assert_eq!(OperationType::parse("INVALID"), None);
        assert_eq!(OperationType::parse(""), None);
    }

    #[test]
    fn apply_to_moves_balance_in_the_right_direction() {
        let amount = Amount::parse("300.00").unwrap();
        assert_eq!(OperationType::Deposit.apply_to(dec!(1000.00), amount), dec!(1300.00));
        assert_eq!(OperationType::Withdraw.apply_to(dec!(1000.00), amount), dec!(700.00));
        assert_eq!(OperationType::Withdraw.apply_to(dec!(100.00), amount), dec!(-200.00));
    }

    #[test]
    fn wallet_serializes_balance_as_two_place_string() {
        let wallet = Wallet::new(dec!(0));
        let json = serde_json::to_value(&wallet).unwrap();
        assert_eq!(json["balance"], "0.00");
        assert_eq!(json["id"], wallet.id.to_string());
    }
}
