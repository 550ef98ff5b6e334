//! Backtest simulator replaying the live signal logic over candles.
//!
//! One simulated position at a time, long only. Fills happen at the candle
//! close with slippage against the trader and a fee on notional. Nothing here
//! touches live engine state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::domain::candle::Candle;
use crate::domain::decimal::{apply_pct, grow_by_pct, mean, pct_change, ratio_pct, shrink_by_pct};
use crate::domain::error::EngineError;
use crate::domain::instrument::InstrumentId;
use crate::domain::metrics::{EquityPoint, peak_and_max_drawdown, profit_factor, sharpe_ratio};
use crate::domain::position::CloseReason;
use crate::domain::price_window::DEFAULT_WINDOW_SIZE;
use crate::domain::signal::SignalGenerator;
use crate::domain::statistics::TradeStatistics;
use crate::domain::strategy::StrategyConfig;

pub const DEFAULT_WARMUP_CANDLES: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    pub fee_pct: Decimal,
    pub slippage_pct: Decimal,
    pub warmup_candles: usize,
    /// Trailing closes handed to the signal generator, matching the live window.
    pub lookback: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: dec!(1000),
            fee_pct: dec!(0.1),
            slippage_pct: dec!(0.05),
            warmup_candles: DEFAULT_WARMUP_CANDLES,
            lookback: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |key: &str, reason: &str| EngineError::ConfigInvalid {
            section: "backtest".into(),
            key: key.into(),
            reason: reason.into(),
        };
        if self.initial_capital <= Decimal::ZERO {
            return Err(invalid("initial_capital", "must be positive"));
        }
        if self.fee_pct < Decimal::ZERO || self.fee_pct >= Decimal::ONE_HUNDRED {
            return Err(invalid("fee_pct", "must be in [0, 100)"));
        }
        if self.slippage_pct < Decimal::ZERO || self.slippage_pct >= Decimal::ONE_HUNDRED {
            return Err(invalid("slippage_pct", "must be in [0, 100)"));
        }
        if self.lookback < 2 {
            return Err(invalid("lookback", "must be at least 2"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestTrade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    /// Cash committed at entry, fee included.
    pub capital: Decimal,
    pub proceeds: Decimal,
    pub fees: Decimal,
    pub pnl: Decimal,
    pub return_pct: Decimal,
    pub holding_candles: usize,
    pub confidence: Decimal,
    pub reason: CloseReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: Decimal,
    pub peak_capital: Decimal,
    pub max_drawdown_pct: Decimal,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub sharpe_ratio: Decimal,
    pub avg_holding_candles: Decimal,
    pub total_fees: Decimal,
    pub statistics: TradeStatistics,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

struct SimPosition {
    entry_index: usize,
    entry_time: DateTime<Utc>,
    entry_price: Decimal,
    quantity: Decimal,
    capital: Decimal,
    entry_fee: Decimal,
    target: Decimal,
    stop: Decimal,
    confidence: Decimal,
}

struct Simulation<'a> {
    config: &'a BacktestConfig,
    strategy: &'a StrategyConfig,
    cash: Decimal,
    position: Option<SimPosition>,
    trades: Vec<BacktestTrade>,
    stats: TradeStatistics,
}

impl Simulation<'_> {
    fn open(&mut self, index: usize, candle: &Candle, confidence: Decimal) {
        let capital = apply_pct(self.cash, self.strategy.position_size_pct);
        if capital <= Decimal::ZERO {
            return;
        }
        let fill = grow_by_pct(candle.close, self.config.slippage_pct);
        let entry_fee = apply_pct(capital, self.config.fee_pct);
        let quantity = (capital - entry_fee) / fill;

        self.cash -= capital;
        debug!(index, price = %fill, %quantity, %confidence, "Backtest entry");
        self.position = Some(SimPosition {
            entry_index: index,
            entry_time: candle.timestamp,
            entry_price: fill,
            quantity,
            capital,
            entry_fee,
            target: grow_by_pct(fill, self.strategy.take_profit_pct),
            stop: shrink_by_pct(fill, self.strategy.stop_loss_pct),
            confidence,
        });
    }

    fn close(&mut self, index: usize, candle: &Candle, reason: CloseReason) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let fill = shrink_by_pct(candle.close, self.config.slippage_pct);
        let gross = pos.quantity * fill;
        let exit_fee = apply_pct(gross, self.config.fee_pct);
        let proceeds = gross - exit_fee;
        let pnl = proceeds - pos.capital;

        self.cash += proceeds;
        self.stats.record(pnl, pos.capital + proceeds);
        debug!(index, price = %fill, %pnl, %reason, "Backtest exit");

        self.trades.push(BacktestTrade {
            entry_time: pos.entry_time,
            exit_time: candle.timestamp,
            entry_price: pos.entry_price,
            exit_price: fill,
            quantity: pos.quantity,
            capital: pos.capital,
            proceeds,
            fees: pos.entry_fee + exit_fee,
            pnl,
            return_pct: ratio_pct(pnl, pos.capital).unwrap_or(Decimal::ZERO),
            holding_candles: index - pos.entry_index,
            confidence: pos.confidence,
            reason,
        });
    }

    fn equity(&self, price: Decimal) -> Decimal {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(Decimal::ZERO, |p| p.quantity * price)
    }
}

pub fn run_backtest(
    candles: &[Candle],
    config: &BacktestConfig,
    strategy: &StrategyConfig,
) -> Result<BacktestReport, EngineError> {
    config.validate()?;
    strategy.validate()?;
    if candles.len() <= config.warmup_candles {
        return Err(EngineError::InsufficientData {
            candles: candles.len(),
            minimum: config.warmup_candles + 1,
        });
    }

    info!(
        candles = candles.len(),
        capital = %config.initial_capital,
        "Starting backtest"
    );

    let generator = SignalGenerator::new(strategy.min_confidence);
    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
    let mut sim = Simulation {
        config,
        strategy,
        cash: config.initial_capital,
        position: None,
        trades: Vec::new(),
        stats: TradeStatistics::default(),
    };
    let mut equity_curve = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        if i >= config.warmup_candles {
            match &sim.position {
                Some(pos) => {
                    let reason = if candle.close >= pos.target {
                        Some(CloseReason::TakeProfit)
                    } else if candle.close <= pos.stop {
                        Some(CloseReason::StopLoss)
                    } else {
                        None
                    };
                    if let Some(reason) = reason {
                        sim.close(i, candle, reason);
                    }
                }
                None => {
                    let from = (i + 1).saturating_sub(config.lookback);
                    let signal = generator.evaluate_prices(InstrumentId(0), &closes[from..=i]);
                    if signal.is_buy() {
                        sim.open(i, candle, signal.confidence);
                    }
                }
            }
        }
        equity_curve.push(EquityPoint {
            timestamp: candle.timestamp,
            equity: sim.equity(candle.close),
        });
    }

    if let Some(last) = candles.last() {
        if sim.position.is_some() {
            sim.close(candles.len() - 1, last, CloseReason::EndOfData);
            if let Some(point) = equity_curve.last_mut() {
                point.equity = sim.cash;
            }
        }
    }

    let final_capital = sim.cash;
    let returns: Vec<Decimal> = sim.trades.iter().map(|t| t.return_pct).collect();
    let (peak_capital, max_drawdown_pct) = peak_and_max_drawdown(&equity_curve);
    let holding: Vec<Decimal> = sim
        .trades
        .iter()
        .map(|t| Decimal::from(t.holding_candles))
        .collect();

    let report = BacktestReport {
        initial_capital: config.initial_capital,
        final_capital,
        total_return_pct: pct_change(config.initial_capital, final_capital).unwrap_or(Decimal::ZERO),
        peak_capital,
        max_drawdown_pct,
        win_rate: sim.stats.win_rate(),
        profit_factor: profit_factor(&sim.stats),
        sharpe_ratio: sharpe_ratio(&returns),
        avg_holding_candles: mean(&holding).unwrap_or(Decimal::ZERO),
        total_fees: sim.trades.iter().map(|t| t.fees).sum(),
        statistics: sim.stats,
        trades: sim.trades,
        equity_curve,
    };

    info!(
        trades = report.trades.len(),
        final_capital = %report.final_capital,
        return_pct = %report.total_return_pct.round_dp(2),
        "Backtest complete"
    );

    Ok(report)
}
