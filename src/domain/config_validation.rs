//! Configuration validation.
//!
//! Checks every raw field before any cycle or backtest runs. The typed
//! config structs enforce ranges once built; this layer catches what the
//! defaulted getters would otherwise hide, such as a missing instrument list
//! or a value that does not parse.

use crate::domain::decimal::parse_decimal;
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

const ENGINE_INTS: &[&str] = &["cycle_interval_secs", "window_size"];

const STRATEGY_DECIMALS: &[&str] = &[
    "position_size_pct",
    "take_profit_pct",
    "stop_loss_pct",
    "trailing_activation_pct",
    "min_trade_size",
    "min_confidence",
];
const STRATEGY_INTS: &[&str] = &["max_open_positions", "max_slippage_bps"];

const RISK_DECIMALS: &[&str] = &[
    "initial_capital",
    "max_drawdown_pct",
    "max_daily_loss_pct",
    "max_position_size_pct",
    "min_reserve",
];
const RISK_INTS: &[&str] = &["max_trades_per_hour", "loss_cooldown_secs"];

const BACKTEST_DECIMALS: &[&str] = &[
    "initial_capital",
    "fee_pct",
    "slippage_pct",
    "start_price",
    "volatility_pct",
    "drift_pct",
];
const BACKTEST_INTS: &[&str] = &["warmup_candles", "lookback", "candles", "seed"];

const PAPER_DECIMALS: &[&str] = &[
    "initial_balance",
    "fee_pct",
    "slippage_pct",
    "start_price",
    "volatility_pct",
    "drift_pct",
];
const PAPER_INTS: &[&str] = &["seed"];

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_instruments(config)?;
    check_ints(config, "engine", ENGINE_INTS)
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    check_decimals(config, "strategy", STRATEGY_DECIMALS)?;
    check_ints(config, "strategy", STRATEGY_INTS)
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    check_decimals(config, "risk", RISK_DECIMALS)?;
    check_ints(config, "risk", RISK_INTS)
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    check_decimals(config, "backtest", BACKTEST_DECIMALS)?;
    check_ints(config, "backtest", BACKTEST_INTS)?;
    if let Some(path) = config.get_string("backtest", "csv") {
        if path.trim().is_empty() {
            return Err(EngineError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "csv".to_string(),
                reason: "csv path must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_paper_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    check_decimals(config, "paper", PAPER_DECIMALS)?;
    check_ints(config, "paper", PAPER_INTS)
}

/// Every section the live loop reads.
pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_engine_config(config)?;
    validate_strategy_config(config)?;
    validate_risk_config(config)?;
    validate_paper_config(config)
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), EngineError> {
    match config.get_string("engine", "instruments") {
        Some(s) if s.split(',').any(|sym| !sym.trim().is_empty()) => Ok(()),
        _ => Err(EngineError::ConfigMissing {
            section: "engine".to_string(),
            key: "instruments".to_string(),
        }),
    }
}

fn check_decimals(config: &dyn ConfigPort, section: &str, keys: &[&str]) -> Result<(), EngineError> {
    for key in keys {
        if let Some(raw) = config.get_string(section, key) {
            if parse_decimal(&raw).is_none() {
                return Err(EngineError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: format!("{} is not a number: {:?}", key, raw),
                });
            }
        }
    }
    Ok(())
}

fn check_ints(config: &dyn ConfigPort, section: &str, keys: &[&str]) -> Result<(), EngineError> {
    for key in keys {
        if let Some(raw) = config.get_string(section, key) {
            if raw.trim().parse::<u64>().is_err() {
                return Err(EngineError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: format!("{} must be a non-negative integer: {:?}", key, raw),
                });
            }
        }
    }
    Ok(())
}
