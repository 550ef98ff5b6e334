//! Exact decimal arithmetic helpers shared by every component.
//!
//! Prices, amounts, PnL, percentages and indicator outputs are all
//! [`Decimal`]. Helpers return `None` where a division by zero or an empty
//! input would make the result undefined.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

/// `value * pct / 100`
pub fn apply_pct(value: Decimal, pct: Decimal) -> Decimal {
    value * pct / Decimal::ONE_HUNDRED
}

/// `value * (1 + pct / 100)`
pub fn grow_by_pct(value: Decimal, pct: Decimal) -> Decimal {
    value * (Decimal::ONE + pct / Decimal::ONE_HUNDRED)
}

/// `value * (1 - pct / 100)`
pub fn shrink_by_pct(value: Decimal, pct: Decimal) -> Decimal {
    value * (Decimal::ONE - pct / Decimal::ONE_HUNDRED)
}

/// `(to - from) / from * 100`, `None` when `from` is zero.
pub fn pct_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    (to - from)
        .checked_div(from)
        .map(|ratio| ratio * Decimal::ONE_HUNDRED)
}

/// `part / whole * 100`, `None` when `whole` is zero.
pub fn ratio_pct(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_div(whole).map(|r| r * Decimal::ONE_HUNDRED)
}

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    sum.checked_div(Decimal::from(values.len()))
}

/// Sum of squared deviations from the mean divided by `divisor`. `None` on
/// overflow, so very large inputs give "no value" instead of a panic.
fn variance(values: &[Decimal], divisor: usize) -> Option<Decimal> {
    let m = mean(values)?;
    let squares = values.iter().try_fold(Decimal::ZERO, |acc, v| {
        let diff = v.checked_sub(m)?;
        acc.checked_add(diff.checked_mul(diff)?)
    })?;
    squares.checked_div(Decimal::from(divisor))
}

/// Population standard deviation (divides by N).
pub fn population_stddev(values: &[Decimal]) -> Option<Decimal> {
    variance(values, values.len())?.sqrt()
}

/// Sample standard deviation (divides by N-1). `None` below two values.
pub fn sample_stddev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    variance(values, values.len() - 1)?.sqrt()
}

/// Truncate toward zero at `dp` fractional digits.
pub fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// Parse a config or CSV field into a `Decimal`, accepting scientific notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}
