//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n prices of the slice, then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k) up to the last price.

use rust_decimal::Decimal;

pub fn ema(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let k = Decimal::TWO / Decimal::from(period + 1);
    let seed = prices[..period].iter().sum::<Decimal>() / Decimal::from(period);

    Some(
        prices[period..]
            .iter()
            .fold(seed, |ema, price| *price * k + ema * (Decimal::ONE - k)),
    )
}
