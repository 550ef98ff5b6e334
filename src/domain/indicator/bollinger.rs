//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - %B: (price - lower) / (upper - lower), 0.5 when the bands coincide
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Default parameters: period=20, multiplier=2.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::decimal::{mean, population_stddev};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub percent_b: Decimal,
}

pub fn bollinger(prices: &[Decimal], period: usize, mult: Decimal) -> Option<Bollinger> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let middle = mean(window)?;
    let stddev = population_stddev(window)?;
    let upper = middle + mult * stddev;
    let lower = middle - mult * stddev;
    let price = *window.last()?;

    let width = upper - lower;
    let percent_b = if width.is_zero() {
        dec!(0.5)
    } else {
        (price - lower) / width
    };

    Some(Bollinger {
        upper,
        middle,
        lower,
        percent_b,
    })
}
