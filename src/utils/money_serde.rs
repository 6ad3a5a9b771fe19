//! Serde helpers for money (decimal strings, never floats).

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::models::money::format_money;
use crate::models::Amount;

/// Serialize Decimal as "1500.00". Used with #[serde(serialize_with = "crate::utils::money_serde::serialize")].
pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    format_money(*value).serialize(serializer)
}

pub fn serialize_amount<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serialize(&amount.value(), serializer)
}

/// Money as it arrives on the wire: `"500.00"` or `500`. Strings are preferred; numbers are
/// rendered back to text and go through the same digit checks.
#[derive(Debug, Clone, PartialEq)]
pub enum MoneyInput {
    Text(String),
    Number(serde_json::Number),
}

impl MoneyInput {
    /// Read a money field from a JSON body. Missing and `null` give `None`. Any other
    /// non-money value keeps its JSON text, which then fails as "not a number".
    pub fn from_json(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Null => None,
            Value::String(s) => Some(MoneyInput::Text(s.clone())),
            Value::Number(n) => Some(MoneyInput::Number(n.clone())),
            other => Some(MoneyInput::Text(other.to_string())),
        }
    }

    /// Plain decimal text. serde_json prints some floats in exponent form (`1e-6`), which is
    /// expanded so the digit checks see every digit. Exponents beyond `Decimal` range stay as is.
    pub fn into_text(self) -> String {
        match self {
            MoneyInput::Text(s) => s,
            MoneyInput::Number(n) => {
                let text = n.to_string();
                if !text.contains(['e', 'E']) {
                    return text;
                }
                Decimal::from_scientific(&text)
                    .map(|d| d.to_string())
                    .unwrap_or(text)
            }
        }
    }
}
