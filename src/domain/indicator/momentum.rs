//! Momentum (rate of change) over n periods.
//!
//! MOM(n) = ((P - P[-n]) / P[-n]) * 100
//! None when P[-n] == 0 or fewer than n+1 prices are available.

use rust_decimal::Decimal;

use crate::domain::decimal::pct_change;

pub fn momentum(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }
    let current = *prices.last()?;
    let previous = prices[prices.len() - 1 - period];
    pct_change(previous, current)
}
