#![allow(dead_code)]

use async_trait::async_trait;
use autotrader::adapters::paper_venue::{PaperConfig, PaperVenue};
use autotrader::domain::engine::TradingEngine;
use autotrader::domain::error::EngineError;
use autotrader::domain::instrument::{Instrument, InstrumentId, InstrumentRegistry};
use autotrader::domain::price_window::PriceObservation;
use autotrader::domain::risk::RiskLimits;
use autotrader::domain::strategy::{EngineConfig, StrategyConfig};
use autotrader::ports::price_port::PricePort;
use autotrader::ports::swap_port::{Execution, Quote, SwapPort};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};

/// Plays back a fixed price path per instrument, marking the venue as it
/// goes. Once a path runs out its last price repeats.
pub struct ScriptedPriceFeed {
    venue: Arc<PaperVenue>,
    paths: Mutex<HashMap<InstrumentId, VecDeque<Decimal>>>,
}

impl ScriptedPriceFeed {
    pub fn new(venue: Arc<PaperVenue>) -> Self {
        Self {
            venue,
            paths: Mutex::new(HashMap::new()),
        }
    }

    pub async fn script(&self, instrument: InstrumentId, prices: Vec<Decimal>) {
        self.paths
            .lock()
            .await
            .insert(instrument, prices.into_iter().collect());
    }
}

#[async_trait]
impl PricePort for ScriptedPriceFeed {
    async fn fetch_prices(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError> {
        let mut paths = self.paths.lock().await;
        for instrument in instruments {
            if let Some(path) = paths.get_mut(&instrument.id) {
                let next = if path.len() > 1 {
                    path.pop_front()
                } else {
                    path.front().copied()
                };
                if let Some(price) = next {
                    self.venue.set_price(instrument.id, price).await;
                }
            }
        }
        drop(paths);
        self.venue.fetch_prices(instruments).await
    }
}

pub struct FailingPriceFeed;

#[async_trait]
impl PricePort for FailingPriceFeed {
    async fn fetch_prices(
        &self,
        _instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError> {
        Err(EngineError::PriceData {
            reason: "feed unavailable".into(),
        })
    }
}

/// Holds every fetch open until the test releases it.
pub struct GatedPriceFeed {
    venue: Arc<PaperVenue>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedPriceFeed {
    pub fn new(venue: Arc<PaperVenue>) -> Self {
        Self {
            venue,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PricePort for GatedPriceFeed {
    async fn fetch_prices(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.venue.fetch_prices(instruments).await
    }
}

/// Settles every buy for a sliver of output that rounds away to nothing.
pub struct DustFillSwapPort {
    pub settlement_ref: String,
}

#[async_trait]
impl SwapPort for DustFillSwapPort {
    async fn quote(
        &self,
        from: &Instrument,
        to: &Instrument,
        amount: Decimal,
        max_slippage_bps: u32,
    ) -> Result<Option<Quote>, EngineError> {
        Ok(Some(Quote {
            input: from.id,
            output: to.id,
            input_amount: amount,
            output_amount: dec!(0.0000000001),
            max_slippage_bps,
        }))
    }

    async fn execute_quote(&self, quote: &Quote) -> Result<Execution, EngineError> {
        Ok(Execution {
            input_amount: quote.input_amount,
            output_amount: quote.output_amount,
            settlement_ref: self.settlement_ref.clone(),
        })
    }

    async fn current_balance(&self, _instrument: &Instrument) -> Result<Decimal, EngineError> {
        Ok(dec!(1000))
    }
}

/// Wraps a venue and can make balance queries fail.
pub struct MockSwapPort {
    pub venue: Arc<PaperVenue>,
    pub fail_balance: AtomicBool,
}

impl MockSwapPort {
    pub fn new(venue: Arc<PaperVenue>) -> Self {
        Self {
            venue,
            fail_balance: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SwapPort for MockSwapPort {
    async fn quote(
        &self,
        from: &Instrument,
        to: &Instrument,
        amount: Decimal,
        max_slippage_bps: u32,
    ) -> Result<Option<Quote>, EngineError> {
        self.venue.quote(from, to, amount, max_slippage_bps).await
    }

    async fn execute_quote(&self, quote: &Quote) -> Result<Execution, EngineError> {
        self.venue.execute_quote(quote).await
    }

    async fn current_balance(&self, instrument: &Instrument) -> Result<Decimal, EngineError> {
        if self.fail_balance.load(Ordering::Relaxed) {
            return Err(EngineError::Balance {
                instrument: instrument.symbol.clone(),
                reason: "rpc timeout".into(),
            });
        }
        self.venue.current_balance(instrument).await
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn registry() -> InstrumentRegistry {
    InstrumentRegistry::default()
}

pub fn instrument(symbol: &str) -> Instrument {
    registry().resolve(symbol).unwrap().clone()
}

pub fn frictionless_venue(balance: Decimal) -> Arc<PaperVenue> {
    Arc::new(
        PaperVenue::new(
            registry(),
            PaperConfig {
                initial_balance: balance,
                fee_pct: Decimal::ZERO,
                slippage_pct: Decimal::ZERO,
            },
        )
        .unwrap(),
    )
}

/// 30% size, 0.5% target, 0.3% stop.
pub fn tight_strategy() -> StrategyConfig {
    StrategyConfig {
        position_size_pct: dec!(30),
        take_profit_pct: dec!(0.5),
        stop_loss_pct: dec!(0.3),
        ..Default::default()
    }
}

pub fn engine_config(symbols: &[&str]) -> EngineConfig {
    EngineConfig {
        instruments: symbols.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub struct Harness {
    pub venue: Arc<PaperVenue>,
    pub feed: Arc<ScriptedPriceFeed>,
    pub engine: TradingEngine,
}

pub fn harness(
    symbols: &[&str],
    strategy: StrategyConfig,
    limits: RiskLimits,
    balance: Decimal,
) -> Harness {
    let venue = frictionless_venue(balance);
    let feed = Arc::new(ScriptedPriceFeed::new(venue.clone()));
    let engine = TradingEngine::new(
        engine_config(symbols),
        strategy,
        limits,
        registry(),
        feed.clone(),
        venue.clone(),
    )
    .unwrap();
    Harness {
        venue,
        feed,
        engine,
    }
}

/// 50 flat prices at 100 followed by `tail`.
pub fn dip_path(tail: &[Decimal]) -> Vec<Decimal> {
    let mut path = vec![dec!(100); 50];
    path.extend_from_slice(tail);
    path
}
