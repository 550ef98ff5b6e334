//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the MACD line, where the line is recomputed
//! from scratch at every historical point of the slice
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Needs slow + signal prices (35 for the defaults).

use rust_decimal::Decimal;

use crate::domain::indicator::ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

pub fn macd(prices: &[Decimal], fast: usize, slow: usize, signal_period: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal_period == 0 {
        return None;
    }
    if prices.len() < slow.max(fast) + signal_period {
        return None;
    }

    let first = slow.max(fast);
    let line_series = (first..=prices.len())
        .map(|end| {
            let history = &prices[..end];
            Some(ema(history, fast)? - ema(history, slow)?)
        })
        .collect::<Option<Vec<Decimal>>>()?;

    let line = *line_series.last()?;
    let signal = ema(&line_series, signal_period)?;

    Some(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}
