//! Weighted-vote signal generation over an [`IndicatorSnapshot`].
//!
//! Each indicator in an extreme state votes for BUY or SELL with a weight;
//! the side whose total exceeds both the other side and 0.5 wins, and a
//! confidence below the configured minimum falls back to HOLD.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::decimal::{grow_by_pct, ratio_pct, shrink_by_pct};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::indicator_engine::IndicatorEngine;
use crate::domain::instrument::InstrumentId;

pub const RSI_WEIGHT: Decimal = dec!(0.25);
pub const MACD_WEIGHT: Decimal = dec!(0.2);
pub const BOLLINGER_WEIGHT: Decimal = dec!(0.2);
pub const STOCHASTIC_WEIGHT: Decimal = dec!(0.15);
pub const MOMENTUM_WEIGHT: Decimal = dec!(0.1);
pub const LOW_VOL_TREND_WEIGHT: Decimal = dec!(0.1);

const RSI_OVERSOLD: Decimal = dec!(30);
const RSI_OVERBOUGHT: Decimal = dec!(70);
const PERCENT_B_LOW: Decimal = dec!(0.1);
const PERCENT_B_HIGH: Decimal = dec!(0.9);
const STOCH_OVERSOLD: Decimal = dec!(20);
const STOCH_OVERBOUGHT: Decimal = dec!(80);
const LOW_VOLATILITY_PCT: Decimal = dec!(3);
const MIN_TREND_PCT: Decimal = dec!(0.5);

const DECISION_THRESHOLD: Decimal = dec!(0.5);
const MAX_CONFIDENCE: Decimal = dec!(0.9);
/// Signals weaker than this are always HOLD, whatever the configured minimum.
pub const CONFIDENCE_FLOOR: Decimal = dec!(0.6);
pub const DEFAULT_MIN_CONFIDENCE: Decimal = CONFIDENCE_FLOOR;

const MIN_TARGET_PCT: Decimal = dec!(0.5);
const MIN_STOP_PCT: Decimal = dec!(0.3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Buy => f.write_str("BUY"),
            Verdict::Sell => f.write_str("SELL"),
            Verdict::Hold => f.write_str("HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub instrument: InstrumentId,
    pub verdict: Verdict,
    pub confidence: Decimal,
    pub price: Decimal,
    pub target: Decimal,
    pub stop: Decimal,
    pub rationale: Vec<String>,
}

impl Signal {
    fn hold(instrument: InstrumentId, price: Decimal, rationale: Vec<String>) -> Self {
        Signal {
            instrument,
            verdict: Verdict::Hold,
            confidence: Decimal::ZERO,
            price,
            target: price,
            stop: price,
            rationale,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.verdict == Verdict::Buy
    }
}

#[derive(Debug, Default)]
struct Tally {
    buy: Decimal,
    sell: Decimal,
    reasons: Vec<String>,
}

impl Tally {
    fn buy(&mut self, weight: Decimal, reason: String) {
        if weight > Decimal::ZERO {
            self.buy += weight;
            self.reasons.push(reason);
        }
    }

    fn sell(&mut self, weight: Decimal, reason: String) {
        if weight > Decimal::ZERO {
            self.sell += weight;
            self.reasons.push(reason);
        }
    }
}

/// `weight * min(1, distance / span)`
fn scaled(weight: Decimal, distance: Decimal, span: Decimal) -> Decimal {
    weight * (distance / span).min(Decimal::ONE)
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    min_confidence: Decimal,
}

impl SignalGenerator {
    /// `min_confidence` is raised to [`CONFIDENCE_FLOOR`] when set lower.
    pub fn new(min_confidence: Decimal) -> Self {
        Self {
            min_confidence: min_confidence.max(CONFIDENCE_FLOOR),
        }
    }

    pub fn min_confidence(&self) -> Decimal {
        self.min_confidence
    }

    /// Evaluate the live window held by `engine`.
    pub fn evaluate(&self, engine: &IndicatorEngine, instrument: InstrumentId) -> Signal {
        self.evaluate_prices(instrument, &engine.prices(instrument))
    }

    /// Evaluate a price history, oldest first. Shared by live trading and backtests.
    pub fn evaluate_prices(&self, instrument: InstrumentId, prices: &[Decimal]) -> Signal {
        match IndicatorSnapshot::from_prices(prices) {
            Some(snapshot) => self.evaluate_snapshot(instrument, &snapshot),
            None => Signal::hold(instrument, Decimal::ZERO, vec!["no price data".into()]),
        }
    }

    pub fn evaluate_snapshot(&self, instrument: InstrumentId, snap: &IndicatorSnapshot) -> Signal {
        let tally = tally_votes(snap);
        let price = snap.price;

        let (verdict, weight) = if tally.buy > tally.sell && tally.buy > DECISION_THRESHOLD {
            (Verdict::Buy, tally.buy)
        } else if tally.sell > tally.buy && tally.sell > DECISION_THRESHOLD {
            (Verdict::Sell, tally.sell)
        } else {
            (Verdict::Hold, Decimal::ZERO)
        };

        let confidence = weight.min(MAX_CONFIDENCE);
        if verdict == Verdict::Hold || confidence < self.min_confidence {
            let mut rationale = tally.reasons;
            if verdict != Verdict::Hold {
                rationale.push(format!("confidence {} below minimum", confidence.round_dp(3)));
            }
            return Signal::hold(instrument, price, rationale);
        }

        let (target_pct, stop_pct) = exit_offsets(snap);
        let (target, stop) = match verdict {
            Verdict::Buy => (grow_by_pct(price, target_pct), shrink_by_pct(price, stop_pct)),
            _ => (shrink_by_pct(price, target_pct), grow_by_pct(price, stop_pct)),
        };

        Signal {
            instrument,
            verdict,
            confidence,
            price,
            target,
            stop,
            rationale: tally.reasons,
        }
    }
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

fn tally_votes(snap: &IndicatorSnapshot) -> Tally {
    let mut tally = Tally::default();

    if let Some(rsi) = snap.rsi {
        if rsi < RSI_OVERSOLD {
            tally.buy(
                scaled(RSI_WEIGHT, RSI_OVERSOLD - rsi, RSI_OVERSOLD),
                format!("RSI oversold ({})", rsi.round_dp(2)),
            );
        } else if rsi > RSI_OVERBOUGHT {
            tally.sell(
                scaled(RSI_WEIGHT, rsi - RSI_OVERBOUGHT, Decimal::ONE_HUNDRED - RSI_OVERBOUGHT),
                format!("RSI overbought ({})", rsi.round_dp(2)),
            );
        }
    }

    if let Some(m) = snap.macd {
        if m.line > Decimal::ZERO && m.histogram > Decimal::ZERO {
            tally.buy(MACD_WEIGHT, "MACD bullish".into());
        } else if m.line < Decimal::ZERO && m.histogram < Decimal::ZERO {
            tally.sell(MACD_WEIGHT, "MACD bearish".into());
        }
    }

    if let Some(b) = snap.bollinger {
        if b.percent_b < PERCENT_B_LOW {
            tally.buy(
                scaled(BOLLINGER_WEIGHT, PERCENT_B_LOW - b.percent_b, PERCENT_B_LOW),
                format!("price near lower band (%B {})", b.percent_b.round_dp(3)),
            );
        } else if b.percent_b > PERCENT_B_HIGH {
            tally.sell(
                scaled(BOLLINGER_WEIGHT, b.percent_b - PERCENT_B_HIGH, Decimal::ONE - PERCENT_B_HIGH),
                format!("price near upper band (%B {})", b.percent_b.round_dp(3)),
            );
        }
    }

    if let Some(s) = snap.stochastic {
        if s.k < STOCH_OVERSOLD {
            tally.buy(STOCHASTIC_WEIGHT, format!("stochastic oversold ({})", s.k.round_dp(1)));
        } else if s.k > STOCH_OVERBOUGHT {
            tally.sell(STOCHASTIC_WEIGHT, format!("stochastic overbought ({})", s.k.round_dp(1)));
        }
    }

    if let Some(trend) = snap.trend_strength() {
        if let Some(mom) = snap.momentum {
            if mom > Decimal::ZERO && trend > Decimal::ZERO {
                tally.buy(MOMENTUM_WEIGHT, "positive momentum with uptrend".into());
            } else if mom < Decimal::ZERO && trend < Decimal::ZERO {
                tally.sell(MOMENTUM_WEIGHT, "negative momentum with downtrend".into());
            }
        }

        let calm = snap.volatility.is_some_and(|vol| vol < LOW_VOLATILITY_PCT);
        if calm && trend.abs() > MIN_TREND_PCT {
            if trend > Decimal::ZERO {
                tally.buy(LOW_VOL_TREND_WEIGHT, "steady uptrend".into());
            } else {
                tally.sell(LOW_VOL_TREND_WEIGHT, "steady downtrend".into());
            }
        }
    }

    tally
}

/// Target and stop distances in percent, scaled by ATR relative to price.
fn exit_offsets(snap: &IndicatorSnapshot) -> (Decimal, Decimal) {
    let atr_pct = snap
        .atr
        .and_then(|atr| ratio_pct(atr, snap.price))
        .unwrap_or(Decimal::ZERO);
    let target_pct = (atr_pct * Decimal::TWO).max(MIN_TARGET_PCT);
    let stop_pct = atr_pct.max(MIN_STOP_PCT);
    (target_pct, stop_pct)
}
