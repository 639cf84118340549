//! Pricing
//!
//! Every monetary amount entering the optimizer passes through [`to_minor_units`] exactly once.
//! The rule is round-half-to-even at the currency's exponent, so `0.125 USD` becomes `12` cents
//! and `0.135 USD` becomes `14` cents. Everything downstream works in integer minor units.

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{
    Money, MoneyError,
    iso::{self, Currency},
};
use thiserror::Error;

/// Largest integer (in minor units) that `good_lp` can hold exactly as an `f64` coefficient.
///
/// Also used as the cost of an unavailable item/store pair: the precision guard rejects any
/// problem whose worst-case total could reach it.
pub const MAX_EXACT_MINOR_UNITS: i64 = 1 << 53;

/// Errors that can occur while converting prices.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The amount cannot be expressed as an `i64` number of minor units.
    #[error("amount {0} cannot be represented in minor units")]
    OutOfRange(Decimal),

    /// Prices and fees must not be negative.
    #[error("amount {0} is negative")]
    Negative(Decimal),

    /// Unknown currency code
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// Look up a supported ISO currency by its alphabetic code.
///
/// # Errors
///
/// Returns [`PricingError::UnknownCurrency`] for codes outside the supported set.
pub fn parse_currency(code: &str) -> Result<&'static Currency, PricingError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "CAD" => Ok(iso::CAD),
        "USD" => Ok(iso::USD),
        "GBP" => Ok(iso::GBP),
        "EUR" => Ok(iso::EUR),
        other => Err(PricingError::UnknownCurrency(other.to_string())),
    }
}

/// Convert an amount in major units to non-negative integer minor units.
///
/// # Errors
///
/// Returns [`PricingError::Negative`] for negative amounts and [`PricingError::OutOfRange`]
/// when the scaled amount reaches [`MAX_EXACT_MINOR_UNITS`].
pub fn to_minor_units(amount: Decimal, currency: &Currency) -> Result<i64, PricingError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PricingError::Negative(amount));
    }

    let scale = 10_i64
        .checked_pow(currency.exponent)
        .ok_or(PricingError::OutOfRange(amount))?;

    amount
        .checked_mul(Decimal::from(scale))
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
        .and_then(|rounded| rounded.to_i64())
        .filter(|&minor_units| minor_units < MAX_EXACT_MINOR_UNITS)
        .ok_or(PricingError::OutOfRange(amount))
}

/// Convert integer minor units back to a major-unit decimal.
pub fn to_major_units(minor_units: i64, currency: &Currency) -> Decimal {
    Decimal::new(minor_units, currency.exponent)
}

/// Sum money amounts, starting from zero in the given currency.
///
/// # Errors
///
/// Returns a [`MoneyError`] on currency mismatch.
pub fn total_price<'a>(
    amounts: impl IntoIterator<Item = Money<'a, Currency>>,
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, MoneyError> {
    amounts
        .into_iter()
        .try_fold(Money::from_minor(0, currency), |acc, amount| acc.add(amount))
}

/// Convert an `i64` to an `f64` if it can be represented exactly.
pub fn i64_to_f64_exact(v: i64) -> Option<f64> {
    let f = v.to_f64()?;

    (f.to_i64() == Some(v)).then_some(f)
}
