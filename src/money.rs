//! Money
//!
//! Conversions between exact decimal amounts and integer minor units. Every monetary value that
//! leaves the engine goes through [`from_major`] exactly once.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Errors from monetary arithmetic.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AmountError {
    /// The amount does not fit in integer minor units.
    #[error("amount {0} overflows minor units")]
    Overflow(Decimal),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Scale factor between major and minor units, e.g. 100 for GBP and 1 for JPY.
fn minor_scale(currency: &Currency) -> Option<Decimal> {
    10_i64.checked_pow(currency.exponent).map(Decimal::from)
}

/// Round an exact major-unit amount to minor units, half away from zero.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the amount does not fit in `i64` minor units.
pub fn from_major(
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, AmountError> {
    let minor = minor_scale(currency)
        .and_then(|scale| amount.checked_mul(scale))
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_i64())
        .ok_or(AmountError::Overflow(amount))?;

    Ok(Money::from_minor(minor, currency))
}

/// Exact major-unit value of an amount.
pub fn to_major(amount: &Money<'_, Currency>) -> Decimal {
    Decimal::new(amount.to_minor_units(), amount.currency().exponent)
}

/// Percentage of an amount, rounded to minor units half away from zero.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the result does not fit in `i64` minor units.
pub fn percent_of(
    percent: Percentage,
    amount: &Money<'static, Currency>,
) -> Result<Money<'static, Currency>, AmountError> {
    let minor = Decimal::from(amount.to_minor_units());
    let value = (percent * Decimal::ONE)
        .checked_mul(minor)
        .map(|product| product.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_i64())
        .ok_or(AmountError::Overflow(minor))?;

    Ok(Money::from_minor(value, amount.currency()))
}

/// Sum amounts in a single currency.
///
/// # Errors
///
/// Returns [`AmountError::Money`] on currency mismatch.
pub fn sum<'a, I>(
    currency: &'static Currency,
    amounts: I,
) -> Result<Money<'static, Currency>, AmountError>
where
    I: IntoIterator<Item = &'a Money<'static, Currency>>,
{
    let total = amounts
        .into_iter()
        .try_fold(Money::from_minor(0, currency), |acc, amount| {
            acc.add(*amount)
        })?;

    Ok(total)
}

/// Fractional percentage as percent points, e.g. `0.25` to `25`, for display.
pub fn percent_points(percentage: Percentage) -> Decimal {
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}
