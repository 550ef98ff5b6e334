//! Position lifecycle: OPEN until a target, stop or emergency exit closes it.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::decimal::{pct_change, shrink_by_pct};
use crate::domain::instrument::InstrumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    Emergency,
    EndOfData,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TrailingStop => "TRAILING_STOP",
            CloseReason::Emergency => "EMERGENCY",
            CloseReason::EndOfData => "END_OF_DATA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub instrument: InstrumentId,
    pub symbol: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    /// Quote currency spent on entry.
    pub capital: Decimal,
    pub target: Decimal,
    pub stop: Decimal,
    pub initial_stop: Decimal,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
    pub settlement_ref: String,
    pub exit: Option<PositionExit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionExit {
    pub price: Decimal,
    pub quantity: Decimal,
    pub proceeds: Decimal,
    pub pnl: Decimal,
    pub reason: CloseReason,
    pub closed_at: DateTime<Utc>,
    pub settlement_ref: String,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        self.market_value(price) - self.capital
    }

    /// Percentage gain of `price` over the entry price.
    pub fn gain_pct(&self, price: Decimal) -> Option<Decimal> {
        pct_change(self.entry_price, price)
    }

    pub fn should_take_profit(&self, price: Decimal) -> bool {
        price >= self.target
    }

    pub fn should_stop_loss(&self, price: Decimal) -> bool {
        price <= self.stop
    }

    pub fn stop_raised(&self) -> bool {
        self.stop > self.initial_stop
    }

    /// Raise the stop to `price * (1 - stop_loss_pct/100)` once the gain
    /// exceeds `activation_pct`. The stop never moves down. Returns whether
    /// it moved.
    pub fn ratchet_stop(&mut self, price: Decimal, stop_loss_pct: Decimal, activation_pct: Decimal) -> bool {
        let Some(gain) = self.gain_pct(price) else {
            return false;
        };
        if gain <= activation_pct {
            return false;
        }
        let candidate = shrink_by_pct(price, stop_loss_pct);
        if candidate > self.stop {
            self.stop = candidate;
            true
        } else {
            false
        }
    }

    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.exit.as_ref().map(|e| e.pnl)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.exit.as_ref().map(|e| e.reason)
    }
}
