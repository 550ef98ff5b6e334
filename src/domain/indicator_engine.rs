//! Rolling price windows per instrument with indicators computed on demand.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::indicator::{IndicatorSnapshot, IndicatorType, IndicatorValue};
use crate::domain::instrument::InstrumentId;
use crate::domain::price_window::{PriceObservation, PriceWindow, DEFAULT_WINDOW_SIZE};

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    window_size: usize,
    windows: HashMap<InstrumentId, PriceWindow>,
}

impl IndicatorEngine {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            windows: HashMap::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn observe(&mut self, instrument: InstrumentId, price: Decimal, timestamp: DateTime<Utc>) {
        let size = self.window_size;
        self.windows
            .entry(instrument)
            .or_insert_with(|| PriceWindow::new(size))
            .push(price, timestamp);
    }

    pub fn observe_all(&mut self, observations: &[PriceObservation]) {
        for obs in observations {
            self.observe(obs.instrument, obs.price, obs.timestamp);
        }
    }

    pub fn window(&self, instrument: InstrumentId) -> Option<&PriceWindow> {
        self.windows.get(&instrument)
    }

    /// Prices for `instrument`, oldest first. Empty when nothing was observed.
    pub fn prices(&self, instrument: InstrumentId) -> Vec<Decimal> {
        self.windows
            .get(&instrument)
            .map(PriceWindow::prices)
            .unwrap_or_default()
    }

    pub fn latest_price(&self, instrument: InstrumentId) -> Option<Decimal> {
        self.windows
            .get(&instrument)
            .and_then(|w| w.latest())
            .map(|p| p.price)
    }

    pub fn compute(&self, indicator: IndicatorType, instrument: InstrumentId) -> Option<IndicatorValue> {
        indicator.calculate(&self.prices(instrument))
    }

    pub fn snapshot(&self, instrument: InstrumentId) -> Option<IndicatorSnapshot> {
        IndicatorSnapshot::from_prices(&self.prices(instrument))
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
