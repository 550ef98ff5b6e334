//! Standard deviation and relative volatility.
//!
//! STDDEV(n) = population standard deviation of the last n prices.
//! VOLATILITY(n) = STDDEV(n) / SMA(n) * 100, None when the mean is zero.

use rust_decimal::Decimal;

use crate::domain::decimal::{mean, population_stddev, ratio_pct};

pub fn stddev(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }
    population_stddev(&prices[prices.len() - period..])
}

pub fn volatility(prices: &[Decimal], period: usize) -> Option<Decimal> {
    let sd = stddev(prices, period)?;
    ratio_pct(sd, mean(&prices[prices.len() - period..])?)
}
