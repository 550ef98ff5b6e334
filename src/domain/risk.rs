//! Risk gate evaluated before any position is opened.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. **Pause**: manual pause flag
//! 2. **Drawdown**: capital below initial by at least `max_drawdown_pct`
//! 3. **Daily loss**: today's realized loss at least `max_daily_loss_pct` of initial
//! 4. **Reserve**: liquid balance below `min_reserve`
//! 5. **Trade rate**: trades in the trailing hour at `max_trades_per_hour`
//! 6. **Cooldown**: a losing close less than `loss_cooldown_secs` ago
//!
//! A denial is a normal outcome, not an error.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::decimal::{apply_pct, ratio_pct};
use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub initial_capital: Decimal,
    pub max_drawdown_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    /// Cap on a single position as a percent of initial capital.
    pub max_position_size_pct: Decimal,
    /// Quote-currency balance that must never be spent.
    pub min_reserve: Decimal,
    pub max_trades_per_hour: u32,
    pub loss_cooldown_secs: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            initial_capital: dec!(1000),
            max_drawdown_pct: dec!(10),
            max_daily_loss_pct: dec!(5),
            max_position_size_pct: dec!(30),
            min_reserve: dec!(50),
            max_trades_per_hour: 10,
            loss_cooldown_secs: 300,
        }
    }
}

fn invalid(key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: "risk".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn is_pct(value: Decimal) -> bool {
    value > Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(invalid("initial_capital", "must be positive"));
        }
        if !is_pct(self.max_drawdown_pct) {
            return Err(invalid("max_drawdown_pct", "must be in (0, 100]"));
        }
        if !is_pct(self.max_daily_loss_pct) {
            return Err(invalid("max_daily_loss_pct", "must be in (0, 100]"));
        }
        if !is_pct(self.max_position_size_pct) {
            return Err(invalid("max_position_size_pct", "must be in (0, 100]"));
        }
        if self.min_reserve < Decimal::ZERO {
            return Err(invalid("min_reserve", "must be non-negative"));
        }
        if self.min_reserve >= self.initial_capital {
            return Err(invalid("min_reserve", "must be below initial_capital"));
        }
        if self.max_trades_per_hour == 0 {
            return Err(invalid("max_trades_per_hour", "must be at least 1"));
        }
        Ok(())
    }
}

/// Mutable state the gate accumulates between evaluations.
#[derive(Debug, Clone, Default)]
pub struct RiskState {
    trade_times: VecDeque<DateTime<Utc>>,
    daily_pnl: Decimal,
    daily_date: Option<NaiveDate>,
    last_loss_at: Option<DateTime<Utc>>,
    paused: bool,
}

/// Quote balance at the venue and the marked value of open positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    pub liquid_balance: Decimal,
    pub open_position_value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    Paused,
    MaxDrawdown { drawdown_pct: Decimal, max_pct: Decimal },
    DailyLoss { loss_pct: Decimal, max_pct: Decimal },
    ReserveBreached { balance: Decimal, reserve: Decimal },
    TradeRateLimit { trades: usize, max: u32 },
    Cooldown { remaining_secs: i64 },
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Paused => "PAUSED",
            DenyReason::MaxDrawdown { .. } => "DRAWDOWN",
            DenyReason::DailyLoss { .. } => "DAILY_LOSS",
            DenyReason::ReserveBreached { .. } => "RESERVE",
            DenyReason::TradeRateLimit { .. } => "RATE",
            DenyReason::Cooldown { .. } => "COOLDOWN",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Paused => write!(f, "trading paused"),
            DenyReason::MaxDrawdown {
                drawdown_pct,
                max_pct,
            } => write!(
                f,
                "max drawdown reached: {}% >= {}%",
                drawdown_pct.round_dp(2),
                max_pct
            ),
            DenyReason::DailyLoss { loss_pct, max_pct } => write!(
                f,
                "daily loss limit reached: {}% >= {}%",
                loss_pct.round_dp(2),
                max_pct
            ),
            DenyReason::ReserveBreached { balance, reserve } => {
                write!(f, "balance {} below reserve {}", balance, reserve)
            }
            DenyReason::TradeRateLimit { trades, max } => {
                write!(f, "trade rate limit: {} trades in the last hour (max {})", trades, max)
            }
            DenyReason::Cooldown { remaining_secs } => {
                write!(f, "loss cooldown: {}s remaining", remaining_secs)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
}

impl RiskDecision {
    pub fn allow() -> Self {
        RiskDecision {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        RiskDecision {
            allowed: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSnapshot {
    pub paused: bool,
    pub current_capital: Decimal,
    pub drawdown_pct: Decimal,
    pub daily_pnl: Decimal,
    pub trades_last_hour: usize,
    pub cooldown_remaining_secs: i64,
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    limits: RiskLimits,
    state: RiskState,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Result<Self, EngineError> {
        limits.validate()?;
        Ok(RiskGate {
            limits,
            state: RiskState::default(),
        })
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Replace every limit at once, or none if the new set is invalid.
    pub fn update_limits(&mut self, limits: RiskLimits) -> Result<(), EngineError> {
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    pub fn resume(&mut self) {
        self.state.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn evaluate(&self, inputs: &RiskInputs, now: DateTime<Utc>) -> RiskDecision {
        if self.state.paused {
            return RiskDecision::deny(DenyReason::Paused);
        }

        let drawdown_pct = self.drawdown_pct(inputs);
        if drawdown_pct >= self.limits.max_drawdown_pct {
            return RiskDecision::deny(DenyReason::MaxDrawdown {
                drawdown_pct,
                max_pct: self.limits.max_drawdown_pct,
            });
        }

        let daily = self.daily_pnl_at(now);
        if daily < Decimal::ZERO {
            let loss_pct =
                ratio_pct(daily.abs(), self.limits.initial_capital).unwrap_or(Decimal::ZERO);
            if loss_pct >= self.limits.max_daily_loss_pct {
                return RiskDecision::deny(DenyReason::DailyLoss {
                    loss_pct,
                    max_pct: self.limits.max_daily_loss_pct,
                });
            }
        }

        if inputs.liquid_balance < self.limits.min_reserve {
            return RiskDecision::deny(DenyReason::ReserveBreached {
                balance: inputs.liquid_balance,
                reserve: self.limits.min_reserve,
            });
        }

        let trades = self.trades_in_last_hour(now);
        if trades >= self.limits.max_trades_per_hour as usize {
            return RiskDecision::deny(DenyReason::TradeRateLimit {
                trades,
                max: self.limits.max_trades_per_hour,
            });
        }

        let remaining_secs = self.cooldown_remaining_secs(now);
        if remaining_secs > 0 {
            return RiskDecision::deny(DenyReason::Cooldown { remaining_secs });
        }

        RiskDecision::allow()
    }

    /// Stamp the rate window, add to today's PnL and start the cooldown on a loss.
    pub fn record_trade(&mut self, pnl: Decimal, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.state.daily_date != Some(today) {
            self.state.daily_date = Some(today);
            self.state.daily_pnl = Decimal::ZERO;
        }
        self.state.daily_pnl += pnl;

        if pnl < Decimal::ZERO {
            self.state.last_loss_at = Some(now);
        }

        let horizon = now - Duration::hours(1);
        while self.state.trade_times.front().is_some_and(|t| *t <= horizon) {
            self.state.trade_times.pop_front();
        }
        self.state.trade_times.push_back(now);
    }

    /// `initial + net_pnl - committed - reserve`, floored at zero.
    pub fn available_capital(&self, net_pnl: Decimal, committed: Decimal) -> Decimal {
        (self.limits.initial_capital + net_pnl - committed - self.limits.min_reserve)
            .max(Decimal::ZERO)
    }

    pub fn max_position_capital(&self) -> Decimal {
        apply_pct(self.limits.initial_capital, self.limits.max_position_size_pct)
    }

    pub fn snapshot(&self, inputs: &RiskInputs, now: DateTime<Utc>) -> RiskSnapshot {
        RiskSnapshot {
            paused: self.state.paused,
            current_capital: inputs.liquid_balance + inputs.open_position_value,
            drawdown_pct: self.drawdown_pct(inputs),
            daily_pnl: self.daily_pnl_at(now),
            trades_last_hour: self.trades_in_last_hour(now),
            cooldown_remaining_secs: self.cooldown_remaining_secs(now),
        }
    }

    fn drawdown_pct(&self, inputs: &RiskInputs) -> Decimal {
        let current = inputs.liquid_balance + inputs.open_position_value;
        let lost = self.limits.initial_capital - current;
        if lost <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ratio_pct(lost, self.limits.initial_capital).unwrap_or(Decimal::ZERO)
    }

    fn daily_pnl_at(&self, now: DateTime<Utc>) -> Decimal {
        if self.state.daily_date == Some(now.date_naive()) {
            self.state.daily_pnl
        } else {
            Decimal::ZERO
        }
    }

    fn trades_in_last_hour(&self, now: DateTime<Utc>) -> usize {
        let horizon = now - Duration::hours(1);
        self.state
            .trade_times
            .iter()
            .filter(|t| **t > horizon)
            .count()
    }

    fn cooldown_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.state.last_loss_at {
            Some(at) => {
                let elapsed = (now - at).num_seconds();
                (self.limits.loss_cooldown_secs as i64 - elapsed).max(0)
            }
            None => 0,
        }
    }
}
