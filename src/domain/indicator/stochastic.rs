//! Stochastic oscillator over close prices.
//!
//! %K = (price - min(window)) / (max(window) - min(window)) * 100, 50 when the
//! range is zero. %D is reported equal to %K: no separate smoothing is
//! applied to it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stochastic {
    pub k: Decimal,
    pub d: Decimal,
}

pub fn stochastic(prices: &[Decimal], period: usize) -> Option<Stochastic> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let price = *window.last()?;
    let low = window.iter().copied().min()?;
    let high = window.iter().copied().max()?;
    let range = high - low;

    let k = if range.is_zero() {
        dec!(50)
    } else {
        (price - low) / range * Decimal::ONE_HUNDRED
    };

    Some(Stochastic { k, d: k })
}
