//! Technical indicators over a chronological price slice.
//!
//! Every indicator is a pure function of `&[Decimal]` (oldest first) and
//! returns `None` when the slice is too short or the formula would divide by
//! zero, so callers can tell "not yet computable" apart from a computed zero.
//!
//! - `IndicatorType`: indicator identity + parameters (usable as a map key)
//! - `IndicatorValue`: the output shapes
//! - `IndicatorSnapshot`: every indicator the signal generator reads, in one pass

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

use rust_decimal::Decimal;
use std::fmt;

pub use atr::atr;
pub use bollinger::{bollinger, Bollinger};
pub use ema::ema;
pub use macd::{macd, Macd};
pub use momentum::momentum;
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::{stddev, volatility};
pub use stochastic::{stochastic, Stochastic};

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
pub const DEFAULT_BOLLINGER_MULT_X100: u32 = 200;
pub const DEFAULT_STOCHASTIC_PERIOD: usize = 14;
pub const DEFAULT_ATR_PERIOD: usize = 14;
pub const DEFAULT_MOMENTUM_PERIOD: usize = 10;
pub const DEFAULT_VOLATILITY_PERIOD: usize = 20;
pub const TREND_FAST_PERIOD: usize = 5;
pub const TREND_SLOW_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(Decimal),
    Macd(Macd),
    Bollinger(Bollinger),
    Stochastic(Stochastic),
}

impl IndicatorValue {
    /// The headline number: the line for MACD, %B for Bollinger, %K for Stochastic.
    pub fn primary(&self) -> Decimal {
        match self {
            IndicatorValue::Simple(v) => *v,
            IndicatorValue::Macd(m) => m.line,
            IndicatorValue::Bollinger(b) => b.percent_b,
            IndicatorValue::Stochastic(s) => s.k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Momentum(usize),
    Volatility(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    /// Compute this indicator over `prices` (oldest first).
    pub fn calculate(&self, prices: &[Decimal]) -> Option<IndicatorValue> {
        match self {
            IndicatorType::Sma(p) => sma(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Ema(p) => ema(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Rsi(p) => rsi(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Atr(p) => atr(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Momentum(p) => momentum(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Volatility(p) => volatility(prices, *p).map(IndicatorValue::Simple),
            IndicatorType::Macd { fast, slow, signal } => {
                macd(prices, *fast, *slow, *signal).map(IndicatorValue::Macd)
            }
            IndicatorType::Stochastic { k_period } => {
                stochastic(prices, *k_period).map(IndicatorValue::Stochastic)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => bollinger(prices, *period, Decimal::new(*stddev_mult_x100 as i64, 2))
                .map(IndicatorValue::Bollinger),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Momentum(period) => write!(f, "MOMENTUM({})", period),
            IndicatorType::Volatility(period) => write!(f, "VOLATILITY({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period } => write!(f, "STOCHASTIC({})", k_period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = Decimal::new(*stddev_mult_x100 as i64, 2).normalize();
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// All indicator readings for one instrument at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub price: Decimal,
    pub sma_fast: Option<Decimal>,
    pub sma_slow: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub macd: Option<Macd>,
    pub bollinger: Option<Bollinger>,
    pub stochastic: Option<Stochastic>,
    pub atr: Option<Decimal>,
    pub momentum: Option<Decimal>,
    pub volatility: Option<Decimal>,
}

impl IndicatorSnapshot {
    /// `None` only when `prices` is empty.
    pub fn from_prices(prices: &[Decimal]) -> Option<Self> {
        let price = *prices.last()?;
        Some(Self {
            price,
            sma_fast: sma(prices, TREND_FAST_PERIOD),
            sma_slow: sma(prices, TREND_SLOW_PERIOD),
            rsi: rsi(prices, DEFAULT_RSI_PERIOD),
            macd: macd(
                prices,
                macd::DEFAULT_FAST,
                macd::DEFAULT_SLOW,
                macd::DEFAULT_SIGNAL,
            ),
            bollinger: bollinger(
                prices,
                DEFAULT_BOLLINGER_PERIOD,
                Decimal::new(DEFAULT_BOLLINGER_MULT_X100 as i64, 2),
            ),
            stochastic: stochastic(prices, DEFAULT_STOCHASTIC_PERIOD),
            atr: atr(prices, DEFAULT_ATR_PERIOD),
            momentum: momentum(prices, DEFAULT_MOMENTUM_PERIOD),
            volatility: volatility(prices, DEFAULT_VOLATILITY_PERIOD),
        })
    }

    /// `(SMA5 - SMA20) / SMA20 * 100`
    pub fn trend_strength(&self) -> Option<Decimal> {
        let fast = self.sma_fast?;
        let slow = self.sma_slow?;
        crate::domain::decimal::pct_change(slow, fast)
    }
}
