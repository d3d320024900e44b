//! Conversion between ledger amounts (decimal major units) and gateway
//! amounts (integer minor units).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Currencies the gateway bills in whole units
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

const THREE_DECIMAL_CURRENCIES: &[&str] = &["bhd", "jod", "kwd", "omr", "tnd"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must be greater than zero")]
    NotPositive,
    #[error("Amount {amount} has more decimal places than {currency} allows")]
    ExcessPrecision { amount: Decimal, currency: String },
    #[error("Amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Number of decimal places in the currency's minor unit
pub fn minor_unit_exponent(currency: &str) -> u32 {
    let code = currency.to_ascii_lowercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        3
    } else {
        2
    }
}

/// Converts a positive major-unit amount to minor units.
/// Amounts that would need rounding are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }

    let exponent = minor_unit_exponent(currency);
    if amount.normalize().scale() > exponent {
        return Err(MoneyError::ExcessPrecision {
            amount,
            currency: currency.to_ascii_lowercase(),
        });
    }

    amount
        .checked_mul(Decimal::from(10i64.pow(exponent)))
        .and_then(|minor| minor.to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_exponent(currency))
}
