//! Position sizing and exit parameters, plus the decision-loop settings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::error::EngineError;
use crate::domain::price_window::DEFAULT_WINDOW_SIZE;
use crate::domain::signal::{CONFIDENCE_FLOOR, DEFAULT_MIN_CONFIDENCE};

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Percent of available capital committed per position.
    pub position_size_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    /// Gain over entry, in percent, before the trailing stop starts moving.
    pub trailing_activation_pct: Decimal,
    pub max_open_positions: usize,
    /// Smallest quote-currency amount worth opening a position with.
    pub min_trade_size: Decimal,
    pub max_slippage_bps: u32,
    pub min_confidence: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            position_size_pct: dec!(20),
            take_profit_pct: dec!(2),
            stop_loss_pct: dec!(1),
            trailing_activation_pct: dec!(0.3),
            max_open_positions: 3,
            min_trade_size: dec!(10),
            max_slippage_bps: 50,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.position_size_pct <= Decimal::ZERO || self.position_size_pct > Decimal::ONE_HUNDRED {
            return Err(invalid("strategy", "position_size_pct", "must be in (0, 100]"));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(invalid("strategy", "take_profit_pct", "must be positive"));
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.stop_loss_pct >= Decimal::ONE_HUNDRED {
            return Err(invalid("strategy", "stop_loss_pct", "must be in (0, 100)"));
        }
        if self.trailing_activation_pct < Decimal::ZERO {
            return Err(invalid(
                "strategy",
                "trailing_activation_pct",
                "must be non-negative",
            ));
        }
        if self.max_open_positions == 0 {
            return Err(invalid("strategy", "max_open_positions", "must be at least 1"));
        }
        if self.min_trade_size < Decimal::ZERO {
            return Err(invalid("strategy", "min_trade_size", "must be non-negative"));
        }
        if self.max_slippage_bps > 10_000 {
            return Err(invalid("strategy", "max_slippage_bps", "must be at most 10000"));
        }
        if self.min_confidence < CONFIDENCE_FLOOR || self.min_confidence > Decimal::ONE {
            return Err(invalid("strategy", "min_confidence", "must be between 0.6 and 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Symbols traded by the decision loop.
    pub instruments: Vec<String>,
    pub cycle_interval_secs: u64,
    pub window_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            instruments: vec!["SOL".into(), "JUP".into()],
            cycle_interval_secs: 30,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.instruments.is_empty() {
            return Err(EngineError::ConfigMissing {
                section: "engine".into(),
                key: "instruments".into(),
            });
        }
        if self.cycle_interval_secs == 0 {
            return Err(invalid("engine", "cycle_interval_secs", "must be at least 1"));
        }
        if self.window_size < 2 {
            return Err(invalid("engine", "window_size", "must be at least 2"));
        }
        Ok(())
    }
}
