//! One trading bot: indicator windows, signal generation, the risk gate and
//! the position ledger wired to a price feed and a swap venue.
//!
//! A cycle runs in a fixed order: fetch prices, feed the windows, manage
//! open positions, query the quote balance, consult the risk gate, evaluate
//! signals and open on BUY. Transient failures are logged and carried in the
//! [`CycleReport`]; they never abort the engine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::domain::error::EngineError;
use crate::domain::indicator_engine::IndicatorEngine;
use crate::domain::instrument::{Instrument, InstrumentId, InstrumentRegistry, QUOTE_SYMBOL};
use crate::domain::ledger::{ManageReport, OpenOutcome, OpenRejection, PositionLedger};
use crate::domain::position::{Position, PositionId};
use crate::domain::risk::{RiskDecision, RiskGate, RiskInputs, RiskLimits, RiskSnapshot};
use crate::domain::signal::{Signal, SignalGenerator};
use crate::domain::statistics::TradeStatistics;
use crate::domain::strategy::{EngineConfig, StrategyConfig};
use crate::ports::price_port::PricePort;
use crate::ports::swap_port::SwapPort;

/// Everything that happened during one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub prices_observed: usize,
    pub signals: Vec<Signal>,
    pub opened: Vec<Position>,
    pub closed: Vec<Position>,
    pub stops_raised: Vec<PositionId>,
    /// Last gate decision consulted this cycle. `None` when the cycle ended
    /// before the gate was consulted.
    pub risk: Option<RiskDecision>,
    pub rejections: Vec<(InstrumentId, OpenRejection)>,
    pub failures: Vec<EngineError>,
}

impl CycleReport {
    fn absorb(&mut self, managed: ManageReport) {
        self.closed.extend(managed.closed);
        self.stops_raised.extend(managed.stops_raised);
        self.failures.extend(managed.failures);
    }
}

pub struct TradingEngine {
    config: EngineConfig,
    registry: InstrumentRegistry,
    instruments: Vec<Instrument>,
    indicators: IndicatorEngine,
    signals: SignalGenerator,
    risk: RiskGate,
    ledger: PositionLedger,
    prices: Arc<dyn PricePort>,
    swap: Arc<dyn SwapPort>,
    cycles: u64,
}

impl TradingEngine {
    /// Validates every setting and resolves the traded symbols up front.
    pub fn new(
        config: EngineConfig,
        strategy: StrategyConfig,
        limits: RiskLimits,
        registry: InstrumentRegistry,
        prices: Arc<dyn PricePort>,
        swap: Arc<dyn SwapPort>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        registry.quote_instrument()?;

        let mut instruments = Vec::with_capacity(config.instruments.len());
        for symbol in &config.instruments {
            let instrument = registry.resolve(symbol)?;
            if instrument.symbol.eq_ignore_ascii_case(QUOTE_SYMBOL) {
                return Err(EngineError::ConfigInvalid {
                    section: "engine".into(),
                    key: "instruments".into(),
                    reason: format!("{} is the quote currency", instrument.symbol),
                });
            }
            if !instruments.iter().any(|i: &Instrument| i.id == instrument.id) {
                instruments.push(instrument.clone());
            }
        }

        Ok(TradingEngine {
            indicators: IndicatorEngine::new(config.window_size),
            signals: SignalGenerator::new(strategy.min_confidence),
            risk: RiskGate::new(limits)?,
            ledger: PositionLedger::new(strategy)?,
            config,
            registry,
            instruments,
            prices,
            swap,
            cycles: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn risk_gate(&self) -> &RiskGate {
        &self.risk
    }

    pub fn statistics(&self) -> &TradeStatistics {
        self.ledger.statistics()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn update_strategy(&mut self, strategy: StrategyConfig) -> Result<(), EngineError> {
        let min_confidence = strategy.min_confidence;
        self.ledger.update_strategy(strategy)?;
        self.signals = SignalGenerator::new(min_confidence);
        info!(min_confidence = %min_confidence, "Strategy updated");
        Ok(())
    }

    pub fn update_limits(&mut self, limits: RiskLimits) -> Result<(), EngineError> {
        self.risk.update_limits(limits)?;
        info!("Risk limits updated");
        Ok(())
    }

    pub fn pause(&mut self) {
        self.risk.pause();
        info!("Trading paused");
    }

    pub fn resume(&mut self) {
        self.risk.resume();
        info!("Trading resumed");
    }

    fn open_value(&self) -> Decimal {
        self.ledger
            .open_position_value(|id| self.indicators.latest_price(id))
    }

    async fn risk_inputs(&self) -> Result<RiskInputs, EngineError> {
        let quote_ccy = self.registry.quote_instrument()?;
        let liquid_balance = self.swap.current_balance(quote_ccy).await?;
        Ok(RiskInputs {
            liquid_balance,
            open_position_value: self.open_value(),
        })
    }

    pub async fn risk_snapshot(&self, now: DateTime<Utc>) -> Result<RiskSnapshot, EngineError> {
        let inputs = self.risk_inputs().await?;
        Ok(self.risk.snapshot(&inputs, now))
    }

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..Default::default()
        };

        let observations = match self.prices.fetch_prices(&self.instruments).await {
            Ok(observations) => observations,
            Err(e) => {
                warn!(cycle = self.cycles, error = %e, "Price fetch failed, skipping cycle");
                report.failures.push(e);
                return report;
            }
        };
        self.indicators.observe_all(&observations);
        report.prices_observed = observations.len();

        let fresh: HashMap<InstrumentId, Decimal> = observations
            .iter()
            .map(|o| (o.instrument, o.price))
            .collect();
        let managed = self
            .ledger
            .manage_positions(&*self.swap, &self.registry, |id| fresh.get(&id).copied(), now)
            .await;
        for position in &managed.closed {
            if let Some(pnl) = position.realized_pnl() {
                self.risk.record_trade(pnl, now);
            }
        }
        report.absorb(managed);

        let inputs = match self.risk_inputs().await {
            Ok(inputs) => inputs,
            Err(e) => {
                warn!(cycle = self.cycles, error = %e, "Balance query failed, no entries this cycle");
                report.failures.push(e);
                return report;
            }
        };
        let mut decision = self.risk.evaluate(&inputs, now);
        if let Some(reason) = &decision.reason {
            info!(code = reason.code(), reason = %reason, "Risk gate denied entries");
        }

        report.signals = self
            .instruments
            .iter()
            .map(|i| self.signals.evaluate(&self.indicators, i.id))
            .collect();

        let instruments = self.instruments.clone();
        let mut attempted = 0usize;
        for (instrument, signal) in instruments.iter().zip(&report.signals) {
            if !signal.is_buy() {
                continue;
            }
            // Every attempt may have spent capital or counted against the trade rate.
            if attempted > 0 {
                match self.risk_inputs().await {
                    Ok(inputs) => decision = self.risk.evaluate(&inputs, now),
                    Err(e) => {
                        warn!(cycle = self.cycles, error = %e, "Balance query failed, no further entries");
                        report.failures.push(e);
                        break;
                    }
                }
                if let Some(reason) = &decision.reason {
                    info!(
                        code = reason.code(),
                        reason = %reason,
                        symbol = %instrument.symbol,
                        "Risk gate closed mid-cycle"
                    );
                }
            }
            if !decision.allowed {
                break;
            }
            attempted += 1;
            debug!(
                symbol = %instrument.symbol,
                confidence = %signal.confidence,
                "Buy signal"
            );
            let available = self.risk.available_capital(
                self.ledger.statistics().net_pnl,
                self.ledger.committed_capital(),
            );
            let outcome = self
                .ledger
                .open_position(
                    &*self.swap,
                    &self.registry,
                    instrument,
                    available,
                    self.risk.max_position_capital(),
                    now,
                )
                .await;
            match outcome {
                Ok(OpenOutcome::Opened(position)) => {
                    self.risk.record_trade(Decimal::ZERO, now);
                    report.opened.push(position);
                }
                Ok(OpenOutcome::Rejected(rejection)) => {
                    report.rejections.push((instrument.id, rejection));
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(symbol = %instrument.symbol, error = %e, "Open failed");
                    } else {
                        error!(symbol = %instrument.symbol, error = %e, "Open failed");
                    }
                    report.failures.push(e);
                }
            }
        }
        report.risk = Some(decision);

        debug!(
            cycle = report.cycle,
            prices = report.prices_observed,
            opened = report.opened.len(),
            closed = report.closed.len(),
            failures = report.failures.len(),
            "Cycle complete"
        );
        report
    }

    /// Close every open position regardless of price.
    pub async fn emergency_close_all(&mut self, now: DateTime<Utc>) -> ManageReport {
        let report = self
            .ledger
            .emergency_close_all(&*self.swap, &self.registry, now)
            .await;
        for position in &report.closed {
            if let Some(pnl) = position.realized_pnl() {
                self.risk.record_trade(pnl, now);
            }
        }
        report
    }
}
