//! Position ledger: open positions, closed history and running statistics.
//!
//! Opening and closing go through a [`SwapPort`]. The ledger only changes
//! after the venue reports a settled execution, so a failed quote or swap
//! leaves it exactly as it was. A failed close keeps the position OPEN and
//! surfaces [`EngineError::UnresolvedExposure`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::domain::decimal::{apply_pct, grow_by_pct, shrink_by_pct};
use crate::domain::error::EngineError;
use crate::domain::instrument::{Instrument, InstrumentId, InstrumentRegistry};
use crate::domain::position::{
    CloseReason, Position, PositionExit, PositionId, PositionStatus,
};
use crate::domain::statistics::TradeStatistics;
use crate::domain::strategy::StrategyConfig;
use crate::ports::swap_port::SwapPort;

/// Why an open request was refused before touching the venue.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenRejection {
    MaxPositions { open: usize, max: usize },
    AlreadyOpen { instrument: InstrumentId },
    InsufficientCapital { available: Decimal, minimum: Decimal },
}

impl fmt::Display for OpenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenRejection::MaxPositions { open, max } => {
                write!(f, "max open positions reached ({}/{})", open, max)
            }
            OpenRejection::AlreadyOpen { instrument } => {
                write!(f, "position already open for {}", instrument)
            }
            OpenRejection::InsufficientCapital { available, minimum } => {
                write!(f, "insufficient capital: {} < {}", available, minimum)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(Position),
    Rejected(OpenRejection),
}

/// Result of one management pass over the open positions.
#[derive(Debug, Default)]
pub struct ManageReport {
    pub closed: Vec<Position>,
    pub stops_raised: Vec<PositionId>,
    pub failures: Vec<EngineError>,
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    strategy: StrategyConfig,
    open: BTreeMap<InstrumentId, Position>,
    closed: Vec<Position>,
    stats: TradeStatistics,
    next_id: u64,
}

impl PositionLedger {
    pub fn new(strategy: StrategyConfig) -> Result<Self, EngineError> {
        strategy.validate()?;
        Ok(PositionLedger {
            strategy,
            open: BTreeMap::new(),
            closed: Vec::new(),
            stats: TradeStatistics::default(),
            next_id: 1,
        })
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    /// Swap in a new strategy after validating it; open positions keep the
    /// targets and stops they were opened with.
    pub fn update_strategy(&mut self, strategy: StrategyConfig) -> Result<(), EngineError> {
        strategy.validate()?;
        self.strategy = strategy;
        Ok(())
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn position(&self, instrument: InstrumentId) -> Option<&Position> {
        self.open.get(&instrument)
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    pub fn statistics(&self) -> &TradeStatistics {
        &self.stats
    }

    /// Quote currency locked in open positions.
    pub fn committed_capital(&self) -> Decimal {
        self.open.values().map(|p| p.capital).sum()
    }

    /// Marked value of open positions; positions without a price count at cost.
    pub fn open_position_value<F>(&self, price_of: F) -> Decimal
    where
        F: Fn(InstrumentId) -> Option<Decimal>,
    {
        self.open
            .values()
            .map(|p| price_of(p.instrument).map_or(p.capital, |price| p.market_value(price)))
            .sum()
    }

    /// Size a new position or say why it cannot be opened. Checks run in
    /// order: position count, duplicate instrument, capital.
    pub fn check_open(
        &self,
        instrument: InstrumentId,
        available: Decimal,
        max_position_capital: Decimal,
    ) -> Result<Decimal, OpenRejection> {
        if self.open.len() >= self.strategy.max_open_positions {
            return Err(OpenRejection::MaxPositions {
                open: self.open.len(),
                max: self.strategy.max_open_positions,
            });
        }
        if self.open.contains_key(&instrument) {
            return Err(OpenRejection::AlreadyOpen { instrument });
        }
        let minimum = self.strategy.min_trade_size;
        if available < minimum {
            return Err(OpenRejection::InsufficientCapital { available, minimum });
        }
        let size = apply_pct(available, self.strategy.position_size_pct).min(max_position_capital);
        if size < minimum || size <= Decimal::ZERO {
            return Err(OpenRejection::InsufficientCapital {
                available: size,
                minimum,
            });
        }
        Ok(size)
    }

    /// Buy `instrument` with quote currency and record the position from the
    /// executed amounts.
    pub async fn open_position<S>(
        &mut self,
        swap: &S,
        registry: &InstrumentRegistry,
        instrument: &Instrument,
        available: Decimal,
        max_position_capital: Decimal,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome, EngineError>
    where
        S: SwapPort + ?Sized,
    {
        let size = match self.check_open(instrument.id, available, max_position_capital) {
            Ok(size) => size,
            Err(rejection) => {
                debug!(symbol = %instrument.symbol, reason = %rejection, "Open rejected");
                return Ok(OpenOutcome::Rejected(rejection));
            }
        };

        let quote_ccy = registry.quote_instrument()?;
        let quote = swap
            .quote(quote_ccy, instrument, size, self.strategy.max_slippage_bps)
            .await?
            .ok_or_else(|| EngineError::QuoteUnavailable {
                from: quote_ccy.symbol.clone(),
                to: instrument.symbol.clone(),
                amount: size,
            })?;
        let execution = swap.execute_quote(&quote).await?;

        let quantity = instrument.normalize(execution.output_amount);
        let entry_price = execution
            .input_amount
            .checked_div(quantity)
            .filter(|p| *p > Decimal::ZERO);
        let Some(entry_price) = entry_price else {
            error!(
                symbol = %instrument.symbol,
                settlement = %execution.settlement_ref,
                input = %execution.input_amount,
                output = %execution.output_amount,
                "Buy settled but fill is unusable, not booked"
            );
            return Err(EngineError::UnbookedFill {
                instrument: instrument.symbol.clone(),
                settlement_ref: execution.settlement_ref,
                reason: format!(
                    "unusable fill: {} in, {} out",
                    execution.input_amount, execution.output_amount
                ),
            });
        };

        let stop = shrink_by_pct(entry_price, self.strategy.stop_loss_pct);
        let position = Position {
            id: PositionId(self.next_id),
            instrument: instrument.id,
            symbol: instrument.symbol.clone(),
            entry_price,
            quantity,
            capital: execution.input_amount,
            target: grow_by_pct(entry_price, self.strategy.take_profit_pct),
            stop,
            initial_stop: stop,
            opened_at: now,
            status: PositionStatus::Open,
            settlement_ref: execution.settlement_ref,
            exit: None,
        };
        self.next_id += 1;

        info!(
            position = %position.id,
            symbol = %position.symbol,
            entry = %position.entry_price,
            quantity = %position.quantity,
            capital = %position.capital,
            target = %position.target,
            stop = %position.stop,
            "Opened position"
        );

        self.open.insert(instrument.id, position.clone());
        Ok(OpenOutcome::Opened(position))
    }

    /// Decide whether the position in `instrument` should close at `price`,
    /// ratcheting its trailing stop when it stays open.
    pub fn exit_decision(&mut self, instrument: InstrumentId, price: Decimal) -> Option<CloseReason> {
        let sl_pct = self.strategy.stop_loss_pct;
        let activation = self.strategy.trailing_activation_pct;
        let position = self.open.get_mut(&instrument)?;

        if position.should_take_profit(price) {
            return Some(CloseReason::TakeProfit);
        }
        if position.should_stop_loss(price) {
            return Some(if position.stop_raised() {
                CloseReason::TrailingStop
            } else {
                CloseReason::StopLoss
            });
        }
        if position.ratchet_stop(price, sl_pct, activation) {
            debug!(position = %position.id, stop = %position.stop, "Trailing stop raised");
        }
        None
    }

    /// Sell the whole position back into quote currency.
    pub async fn close_position<S>(
        &mut self,
        swap: &S,
        registry: &InstrumentRegistry,
        instrument: InstrumentId,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<Position, EngineError>
    where
        S: SwapPort + ?Sized,
    {
        let position = self
            .open
            .get(&instrument)
            .ok_or_else(|| EngineError::Execution {
                instrument: instrument.to_string(),
                reason: "no open position".into(),
            })?;
        let asset = registry
            .get(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument {
                symbol: position.symbol.clone(),
            })?;
        let quote_ccy = registry.quote_instrument()?;

        let unresolved = |reason: String| EngineError::UnresolvedExposure {
            position_id: position.id.0,
            instrument: position.symbol.clone(),
            reason,
        };

        let quantity = position.quantity;
        let max_slippage_bps = self.strategy.max_slippage_bps;
        let settled = async {
            let quote = swap
                .quote(asset, quote_ccy, quantity, max_slippage_bps)
                .await?
                .ok_or_else(|| EngineError::QuoteUnavailable {
                    from: asset.symbol.clone(),
                    to: quote_ccy.symbol.clone(),
                    amount: quantity,
                })?;
            swap.execute_quote(&quote).await
        }
        .await;

        let execution = match settled {
            Ok(execution) => execution,
            Err(e) => {
                let err = unresolved(e.to_string());
                error!(
                    position = %position.id,
                    symbol = %position.symbol,
                    reason = %reason,
                    error = %e,
                    "Close failed, position remains open"
                );
                return Err(err);
            }
        };

        let Some(mut position) = self.open.remove(&instrument) else {
            return Err(EngineError::Execution {
                instrument: instrument.to_string(),
                reason: "position vanished during close".into(),
            });
        };

        let proceeds = execution.output_amount;
        let pnl = proceeds - position.capital;
        let exit_price = proceeds
            .checked_div(position.quantity)
            .unwrap_or(Decimal::ZERO);

        position.status = PositionStatus::Closed;
        position.exit = Some(PositionExit {
            price: exit_price,
            quantity: position.quantity,
            proceeds,
            pnl,
            reason,
            closed_at: now,
            settlement_ref: execution.settlement_ref,
        });
        self.stats.record(pnl, position.capital + proceeds);

        info!(
            position = %position.id,
            symbol = %position.symbol,
            reason = %reason,
            exit = %exit_price,
            pnl = %pnl,
            net_pnl = %self.stats.net_pnl,
            "Closed position"
        );

        self.closed.push(position.clone());
        Ok(position)
    }

    /// Run exit checks for every open position that has a price.
    pub async fn manage_positions<S, F>(
        &mut self,
        swap: &S,
        registry: &InstrumentRegistry,
        price_of: F,
        now: DateTime<Utc>,
    ) -> ManageReport
    where
        S: SwapPort + ?Sized,
        F: Fn(InstrumentId) -> Option<Decimal>,
    {
        let mut report = ManageReport::default();
        let instruments: Vec<InstrumentId> = self.open.keys().copied().collect();

        for instrument in instruments {
            let Some(price) = price_of(instrument) else {
                continue;
            };
            let stop_before = self.open.get(&instrument).map(|p| p.stop);
            match self.exit_decision(instrument, price) {
                Some(reason) => {
                    match self.close_position(swap, registry, instrument, reason, now).await {
                        Ok(closed) => report.closed.push(closed),
                        Err(e) => report.failures.push(e),
                    }
                }
                None => {
                    if let Some(p) = self.open.get(&instrument) {
                        if Some(p.stop) != stop_before {
                            report.stops_raised.push(p.id);
                        }
                    }
                }
            }
        }
        report
    }

    /// Close every open position. Failures are collected, not short-circuited.
    pub async fn emergency_close_all<S>(
        &mut self,
        swap: &S,
        registry: &InstrumentRegistry,
        now: DateTime<Utc>,
    ) -> ManageReport
    where
        S: SwapPort + ?Sized,
    {
        let mut report = ManageReport::default();
        let instruments: Vec<InstrumentId> = self.open.keys().copied().collect();
        info!(count = instruments.len(), "Emergency close of all positions");

        for instrument in instruments {
            match self
                .close_position(swap, registry, instrument, CloseReason::Emergency, now)
                .await
            {
                Ok(closed) => report.closed.push(closed),
                Err(e) => report.failures.push(e),
            }
        }
        report
    }
}
