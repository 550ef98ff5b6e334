//! RSI (Relative Strength Index) over the last n price changes.
//!
//! avg_gain and avg_loss are simple means of the positive deltas and the
//! absolute negative deltas; no Wilder smoothing.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Needs n+1 prices.

use rust_decimal::Decimal;

pub fn rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let tail = &prices[prices.len() - period - 1..];
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;

    for pair in tail.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let n = Decimal::from(period);
    let avg_gain = gains / n;
    let avg_loss = losses / n;

    if avg_loss.is_zero() {
        return Some(Decimal::ONE_HUNDRED);
    }

    Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + avg_gain / avg_loss))
}
