//! Average True Range approximated from close-only data.
//!
//! No real high/low is available for on-chain spot prices, so each close is
//! given a fixed synthetic spread: high = close * 1.005, low = close * 0.995.
//! TR = max(high - low, |high - prev_close|, |low - prev_close|), averaged over
//! the last n changes. Callers must not treat the result as an OHLC ATR.
//!
//! Needs n+1 prices.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::decimal::{grow_by_pct, shrink_by_pct};

pub const SYNTHETIC_SPREAD_PCT: Decimal = dec!(0.5);

/// max(high - low, |high - prev_close|, |low - prev_close|)
pub fn true_range(high: Decimal, low: Decimal, prev_close: Decimal) -> Decimal {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

pub fn atr(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let tail = &prices[prices.len() - period - 1..];
    let sum: Decimal = tail
        .windows(2)
        .map(|pair| {
            let close = pair[1];
            let high = grow_by_pct(close, SYNTHETIC_SPREAD_PCT);
            let low = shrink_by_pct(close, SYNTHETIC_SPREAD_PCT);
            true_range(high, low, pair[0])
        })
        .sum();

    Some(sum / Decimal::from(period))
}
