//! Candle representation and synthetic series for backtests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::domain::decimal::grow_by_pct;
use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Low <= open, close <= high and every price positive.
    pub fn is_consistent(&self) -> bool {
        self.low > Decimal::ZERO
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= Decimal::ZERO
    }
}

fn series_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or_default()
}

/// Random-walk hourly candles. Each close moves `drift_pct` plus a uniform
/// shock of up to `volatility_pct` percent; the same seed always gives the
/// same series.
pub fn generate_synthetic_candles(
    count: usize,
    start_price: Decimal,
    volatility_pct: Decimal,
    drift_pct: Decimal,
    seed: u64,
) -> Result<Vec<Candle>, EngineError> {
    if start_price <= Decimal::ZERO {
        return Err(EngineError::CandleData {
            reason: format!("start price must be positive, got {}", start_price),
        });
    }
    if volatility_pct < Decimal::ZERO || volatility_pct >= Decimal::ONE_HUNDRED {
        return Err(EngineError::CandleData {
            reason: format!("volatility must be in [0, 100), got {}", volatility_pct),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let start = series_start();
    let mut open = start_price;
    let mut candles = Vec::with_capacity(count);

    for i in 0..count {
        // shocks in [-1, 1] at 4 dp
        let shock = Decimal::new(rng.gen_range(-10_000i64..=10_000), 4);
        let wick = Decimal::new(rng.gen_range(0i64..=10_000), 4);
        let change_pct = drift_pct + volatility_pct * shock;

        let close = grow_by_pct(open, change_pct).round_dp(8).max(Decimal::new(1, 8));
        let spread_pct = volatility_pct * wick / Decimal::TWO;
        let high = grow_by_pct(open.max(close), spread_pct).round_dp(8);
        let low = (open.min(close) * (Decimal::ONE - spread_pct / Decimal::ONE_HUNDRED))
            .round_dp(8)
            .max(Decimal::new(1, 8));
        let volume = Decimal::from(rng.gen_range(1_000u32..=10_000));

        candles.push(Candle {
            timestamp: start + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
        open = close;
    }

    Ok(candles)
}

/// `count` identical candles at `price`.
pub fn flat_candles(count: usize, price: Decimal) -> Vec<Candle> {
    let start = series_start();
    (0..count)
        .map(|i| Candle {
            timestamp: start + Duration::hours(i as i64),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ONE_THOUSAND,
        })
        .collect()
}
