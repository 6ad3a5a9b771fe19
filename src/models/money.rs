//! Fixed-point money: two decimal places, at most twelve digits (NUMERIC(12, 2)).
//! Amounts arrive as text and are checked digit-by-digit before they become a `Decimal`,
//! so nothing ever passes through binary floating point.

use rust_decimal::Decimal;
use thiserror::Error;

pub const DECIMAL_PLACES: u32 = 2;
pub const MAX_DIGITS: usize = 12;
pub const MAX_WHOLE_DIGITS: usize = MAX_DIGITS - DECIMAL_PLACES as usize;

/// Largest value a NUMERIC(12, 2) column holds: 9 999 999 999.99
pub fn max_balance() -> Decimal {
    Decimal::new(999_999_999_999, DECIMAL_PLACES)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("A valid number is required")]
    NotANumber,
    #[error("Ensure that there are no more than {} digits in total", MAX_DIGITS)]
    TooManyDigits,
    #[error("Ensure that there are no more than {} decimal places", DECIMAL_PLACES)]
    TooManyDecimalPlaces,
    #[error("Ensure that there are no more than {} digits before the decimal point", MAX_WHOLE_DIGITS)]
    TooManyWholeDigits,
    #[error("Amount cannot be negative")]
    Negative,
    #[error("Amount cannot be zero")]
    Zero,
}

/// Parse a plain decimal string (`"500"`, `"-12.5"`, `" 0.01 "`) into a `Decimal` rescaled to
/// two places. Exponents, separators, `NaN` and `Infinity` are rejected. Sign is not checked.
pub fn parse_decimal(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    let (negative, body) = match trimmed.chars().next() {
        Some('-') => (true, &trimmed[1..]),
        Some('+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (whole, fraction) = match body.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (body, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) || (whole.is_empty() && fraction.is_empty()) {
        return Err(AmountError::NotANumber);
    }

    let whole = whole.trim_start_matches('0');
    let whole_digits = whole.len();
    let fraction_digits = fraction.len();

    if whole_digits + fraction_digits > MAX_DIGITS {
        return Err(AmountError::TooManyDigits);
    }
    if fraction_digits > DECIMAL_PLACES as usize {
        return Err(AmountError::TooManyDecimalPlaces);
    }
    if whole_digits > MAX_WHOLE_DIGITS {
        return Err(AmountError::TooManyWholeDigits);
    }

    let digits = format!("{}{}", whole, fraction);
    let mantissa: i64 = if digits.trim_start_matches('0').is_empty() {
        0
    } else {
        digits.parse().map_err(|_| AmountError::NotANumber)?
    };

    let mut value = Decimal::new(if negative { -mantissa } else { mantissa }, fraction_digits as u32);
    value.rescale(DECIMAL_PLACES);
    Ok(value)
}

/// Render a decimal with exactly two fractional digits, e.g. `"1500.00"`.
pub fn format_money(value: Decimal) -> String {
    let mut value = value.round_dp(DECIMAL_PLACES);
    value.rescale(DECIMAL_PLACES);
    if value.is_zero() {
        value.set_sign_positive(true);
    }
    value.to_string()
}

/// A strictly positive money amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Ordered checks: format and precision first, then negative, then zero.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        Self::try_from(parse_decimal(input)?)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_zero() {
            return Err(AmountError::Zero);
        }
        if value.is_sign_negative() {
            return Err(AmountError::Negative);
        }
        if value.scale() > DECIMAL_PLACES && value.normalize().scale() > DECIMAL_PLACES {
            return Err(AmountError::TooManyDecimalPlaces);
        }
        let mut value = value;
        value.rescale(DECIMAL_PLACES);
        Ok(Amount(value))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_money(self.0))
    }
}
