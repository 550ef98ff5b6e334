//! In-memory paper trading venue.
//!
//! Implements both the price and swap ports against marked prices held in
//! memory. Quotes convert through the quote currency at the last mark, take a
//! fee on the input and lose a fixed slippage at execution. Balances are
//! tracked per instrument and every settled swap gets the next `paper-N`
//! reference.
//!
//! Failures can be scripted so callers can exercise close-leg errors and
//! missing routes without a real venue.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::decimal::{apply_pct, shrink_by_pct};
use crate::domain::error::EngineError;
use crate::domain::instrument::{Instrument, InstrumentId, InstrumentRegistry};
use crate::domain::price_window::PriceObservation;
use crate::ports::price_port::PricePort;
use crate::ports::swap_port::{Execution, Quote, SwapPort};

#[derive(Debug, Clone, PartialEq)]
pub struct PaperConfig {
    /// Quote-currency balance the venue starts with.
    pub initial_balance: Decimal,
    /// Fee taken from the input amount, in percent.
    pub fee_pct: Decimal,
    /// Output shortfall at execution, in percent.
    pub slippage_pct: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(1000),
            fee_pct: dec!(0.1),
            slippage_pct: dec!(0.05),
        }
    }
}

impl PaperConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |key: &str, reason: &str| EngineError::ConfigInvalid {
            section: "paper".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if self.initial_balance < Decimal::ZERO {
            return Err(invalid("initial_balance", "must be non-negative"));
        }
        if self.fee_pct < Decimal::ZERO || self.fee_pct >= Decimal::ONE_HUNDRED {
            return Err(invalid("fee_pct", "must be in [0, 100)"));
        }
        if self.slippage_pct < Decimal::ZERO || self.slippage_pct >= Decimal::ONE_HUNDRED {
            return Err(invalid("slippage_pct", "must be in [0, 100)"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct VenueState {
    marks: HashMap<InstrumentId, Decimal>,
    balances: HashMap<InstrumentId, Decimal>,
    next_settlement: u64,
    failing_executions: u32,
    routes_closed: bool,
}

pub struct PaperVenue {
    registry: InstrumentRegistry,
    quote_ccy: InstrumentId,
    config: PaperConfig,
    state: RwLock<VenueState>,
}

impl PaperVenue {
    pub fn new(registry: InstrumentRegistry, config: PaperConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let quote_ccy = registry.quote_instrument()?.id;

        let mut state = VenueState {
            next_settlement: 1,
            ..Default::default()
        };
        state.marks.insert(quote_ccy, Decimal::ONE);
        state.balances.insert(quote_ccy, config.initial_balance);

        Ok(Self {
            registry,
            quote_ccy,
            config,
            state: RwLock::new(state),
        })
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PaperConfig {
        &self.config
    }

    /// Mark an instrument at `price` in quote currency.
    pub async fn set_price(&self, instrument: InstrumentId, price: Decimal) {
        if instrument == self.quote_ccy {
            return;
        }
        self.state.write().await.marks.insert(instrument, price);
    }

    pub async fn price(&self, instrument: InstrumentId) -> Option<Decimal> {
        self.state.read().await.marks.get(&instrument).copied()
    }

    pub async fn balance(&self, instrument: InstrumentId) -> Decimal {
        self.state
            .read()
            .await
            .balances
            .get(&instrument)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Make the next `count` executions fail without settling.
    pub async fn fail_next_executions(&self, count: u32) {
        self.state.write().await.failing_executions = count;
    }

    /// While closed, every quote request finds no route.
    pub async fn set_routes_closed(&self, closed: bool) {
        self.state.write().await.routes_closed = closed;
    }

    fn instrument(&self, id: InstrumentId) -> Result<&Instrument, EngineError> {
        self.registry
            .get(id)
            .ok_or_else(|| EngineError::UnknownInstrument {
                symbol: id.to_string(),
            })
    }
}

#[async_trait]
impl PricePort for PaperVenue {
    async fn fetch_prices(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(instruments
            .iter()
            .filter_map(|i| {
                state.marks.get(&i.id).map(|price| PriceObservation {
                    instrument: i.id,
                    price: *price,
                    timestamp: now,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SwapPort for PaperVenue {
    async fn quote(
        &self,
        from: &Instrument,
        to: &Instrument,
        amount: Decimal,
        max_slippage_bps: u32,
    ) -> Result<Option<Quote>, EngineError> {
        let state = self.state.read().await;
        if state.routes_closed || amount <= Decimal::ZERO || from.id == to.id {
            return Ok(None);
        }
        let (Some(from_price), Some(to_price)) = (state.marks.get(&from.id), state.marks.get(&to.id))
        else {
            return Ok(None);
        };
        if to_price.is_zero() {
            return Ok(None);
        }

        let value = shrink_by_pct(amount * from_price, self.config.fee_pct);
        let output_amount = value / to_price;
        debug!(
            from = %from.symbol,
            to = %to.symbol,
            input = %amount,
            output = %output_amount,
            "Paper quote"
        );
        Ok(Some(Quote {
            input: from.id,
            output: to.id,
            input_amount: amount,
            output_amount,
            max_slippage_bps,
        }))
    }

    async fn execute_quote(&self, quote: &Quote) -> Result<Execution, EngineError> {
        let input = self.instrument(quote.input)?;
        let output = self.instrument(quote.output)?;
        let mut state = self.state.write().await;

        if state.failing_executions > 0 {
            state.failing_executions -= 1;
            warn!(input = %input.symbol, output = %output.symbol, "Scripted paper execution failure");
            return Err(EngineError::Execution {
                instrument: output.symbol.clone(),
                reason: "simulated venue failure".to_string(),
            });
        }

        let slippage_bps = self.config.slippage_pct * Decimal::ONE_HUNDRED;
        if slippage_bps > Decimal::from(quote.max_slippage_bps) {
            return Err(EngineError::Execution {
                instrument: output.symbol.clone(),
                reason: format!(
                    "slippage {} bps exceeds limit {} bps",
                    slippage_bps, quote.max_slippage_bps
                ),
            });
        }

        let held = state.balances.get(&input.id).copied().unwrap_or(Decimal::ZERO);
        if held < quote.input_amount {
            return Err(EngineError::Execution {
                instrument: input.symbol.clone(),
                reason: format!("insufficient balance: {} < {}", held, quote.input_amount),
            });
        }

        let slipped = quote.output_amount - apply_pct(quote.output_amount, self.config.slippage_pct);
        let output_amount = output.normalize(slipped);
        *state.balances.entry(input.id).or_default() -= quote.input_amount;
        *state.balances.entry(output.id).or_default() += output_amount;

        let settlement_ref = format!("paper-{}", state.next_settlement);
        state.next_settlement += 1;

        info!(
            settlement = %settlement_ref,
            input = %input.symbol,
            output = %output.symbol,
            paid = %quote.input_amount,
            received = %output_amount,
            "Paper swap settled"
        );

        Ok(Execution {
            input_amount: quote.input_amount,
            output_amount,
            settlement_ref,
        })
    }

    async fn current_balance(&self, instrument: &Instrument) -> Result<Decimal, EngineError> {
        Ok(self.balance(instrument.id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frictionless() -> PaperConfig {
        PaperConfig {
            initial_balance: dec!(1000),
            fee_pct: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
        }
    }

    async fn venue(config: PaperConfig) -> (PaperVenue, Instrument, Instrument) {
        let registry = InstrumentRegistry::default();
        let usdc = registry.resolve("USDC").unwrap().clone();
        let sol = registry.resolve("SOL").unwrap().clone();
        let venue = PaperVenue::new(registry, config).unwrap();
        venue.set_price(sol.id, dec!(95)).await;
        (venue, usdc, sol)
    }

    #[tokio::test]
    async fn round_trip_without_costs() {
        let (venue, usdc, sol) = venue(frictionless()).await;

        let buy = venue.quote(&usdc, &sol, dec!(285), 50).await.unwrap().unwrap();
        assert_eq!(buy.output_amount, dec!(3));
        let filled = venue.execute_quote(&buy).await.unwrap();
        assert_eq!(filled.output_amount, dec!(3));
        assert_eq!(filled.settlement_ref, "paper-1");
        assert_eq!(venue.balance(usdc.id).await, dec!(715));
        assert_eq!(venue.balance(sol.id).await, dec!(3));

        venue.set_price(sol.id, dec!(96)).await;
        let sell = venue.quote(&sol, &usdc, dec!(3), 50).await.unwrap().unwrap();
        let settled = venue.execute_quote(&sell).await.unwrap();
        assert_eq!(settled.output_amount, dec!(288));
        assert_eq!(settled.settlement_ref, "paper-2");
        assert_eq!(venue.balance(usdc.id).await, dec!(1003));
    }

    #[tokio::test]
    async fn fee_and_slippage_reduce_output() {
        let (venue, usdc, sol) = venue(PaperConfig {
            fee_pct: dec!(1),
            slippage_pct: dec!(0.1),
            ..frictionless()
        })
        .await;
        let quote = venue.quote(&usdc, &sol, dec!(95), 50).await.unwrap().unwrap();
        assert_eq!(quote.output_amount, dec!(0.99));
        let filled = venue.execute_quote(&quote).await.unwrap();
        assert_eq!(filled.output_amount, dec!(0.98901));
    }

    #[tokio::test]
    async fn slippage_above_limit_fails() {
        let (venue, usdc, sol) = venue(PaperConfig {
            slippage_pct: dec!(1),
            ..frictionless()
        })
        .await;
        let quote = venue.quote(&usdc, &sol, dec!(95), 50).await.unwrap().unwrap();
        assert!(venue.execute_quote(&quote).await.is_err());
        assert_eq!(venue.balance(usdc.id).await, dec!(1000));
    }

    #[tokio::test]
    async fn unpriced_instrument_has_no_route() {
        let (venue, usdc, _) = venue(frictionless()).await;
        let jup = venue.registry().resolve("JUP").unwrap().clone();
        assert_eq!(venue.quote(&usdc, &jup, dec!(10), 50).await.unwrap(), None);

        venue.set_routes_closed(true).await;
        let sol = venue.registry().resolve("SOL").unwrap().clone();
        assert_eq!(venue.quote(&usdc, &sol, dec!(10), 50).await.unwrap(), None);
    }

    #[tokio::test]
    async fn scripted_failure_leaves_balances() {
        let (venue, usdc, sol) = venue(frictionless()).await;
        venue.fail_next_executions(1).await;
        let quote = venue.quote(&usdc, &sol, dec!(95), 50).await.unwrap().unwrap();
        assert!(venue.execute_quote(&quote).await.is_err());
        assert_eq!(venue.balance(usdc.id).await, dec!(1000));
        assert_eq!(venue.balance(sol.id).await, Decimal::ZERO);
        assert!(venue.execute_quote(&quote).await.is_ok());
    }

    #[tokio::test]
    async fn insufficient_balance_fails() {
        let (venue, usdc, sol) = venue(frictionless()).await;
        let quote = venue.quote(&usdc, &sol, dec!(5000), 50).await.unwrap().unwrap();
        assert!(matches!(
            venue.execute_quote(&quote).await,
            Err(EngineError::Execution { .. })
        ));
    }

    #[tokio::test]
    async fn prices_only_for_marked_instruments() {
        let (venue, _, sol) = venue(frictionless()).await;
        let jup = venue.registry().resolve("JUP").unwrap().clone();
        let obs = venue.fetch_prices(&[sol.clone(), jup]).await.unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].instrument, sol.id);
        assert_eq!(obs[0].price, dec!(95));
    }
}
