//! Seeded random-walk price feed over a [`PaperVenue`].
//!
//! Every fetch moves each requested instrument by a uniform shock, marks the
//! venue at the new price and returns it. Instruments without a mark start
//! at `start_price`.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use crate::adapters::paper_venue::PaperVenue;
use crate::domain::decimal::grow_by_pct;
use crate::domain::error::EngineError;
use crate::domain::instrument::Instrument;
use crate::domain::price_window::PriceObservation;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFeedConfig {
    pub start_price: Decimal,
    /// Largest move per fetch, in percent either way.
    pub volatility_pct: Decimal,
    pub drift_pct: Decimal,
    pub seed: u64,
}

impl Default for SyntheticFeedConfig {
    fn default() -> Self {
        Self {
            start_price: dec!(100),
            volatility_pct: dec!(0.5),
            drift_pct: Decimal::ZERO,
            seed: 42,
        }
    }
}

pub struct SyntheticPriceFeed {
    venue: Arc<PaperVenue>,
    config: SyntheticFeedConfig,
    rng: Mutex<StdRng>,
}

impl SyntheticPriceFeed {
    pub fn new(venue: Arc<PaperVenue>, config: SyntheticFeedConfig) -> Result<Self, EngineError> {
        if config.start_price <= Decimal::ZERO {
            return Err(EngineError::ConfigInvalid {
                section: "paper".to_string(),
                key: "start_price".to_string(),
                reason: "start_price must be positive".to_string(),
            });
        }
        if config.volatility_pct < Decimal::ZERO || config.volatility_pct >= Decimal::ONE_HUNDRED {
            return Err(EngineError::ConfigInvalid {
                section: "paper".to_string(),
                key: "volatility_pct".to_string(),
                reason: "volatility_pct must be in [0, 100)".to_string(),
            });
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            venue,
            config,
            rng: Mutex::new(rng),
        })
    }

    fn shock(&self, rng: &mut StdRng) -> Decimal {
        // Basis-point resolution keeps the walk exact in Decimal.
        let bps = (self.config.volatility_pct * Decimal::ONE_HUNDRED)
            .trunc()
            .try_into()
            .unwrap_or(0i64);
        if bps == 0 {
            return self.config.drift_pct;
        }
        let step = rng.gen_range(-bps..=bps);
        self.config.drift_pct + Decimal::new(step, 2)
    }
}

#[async_trait]
impl PricePort for SyntheticPriceFeed {
    async fn fetch_prices(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError> {
        let mut rng = self.rng.lock().await;
        let mut moves = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            let last = self
                .venue
                .price(instrument.id)
                .await
                .unwrap_or(self.config.start_price);
            let next = grow_by_pct(last, self.shock(&mut rng)).round_dp(8);
            let next = if next > Decimal::ZERO { next } else { last };
            moves.push((instrument.id, next));
        }
        drop(rng);

        for (id, price) in moves {
            self.venue.set_price(id, price).await;
        }
        self.venue.fetch_prices(instruments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::paper_venue::PaperConfig;
    use crate::domain::instrument::InstrumentRegistry;

    fn feed(seed: u64) -> (Arc<PaperVenue>, SyntheticPriceFeed) {
        let venue =
            Arc::new(PaperVenue::new(InstrumentRegistry::default(), PaperConfig::default()).unwrap());
        let feed = SyntheticPriceFeed::new(
            venue.clone(),
            SyntheticFeedConfig {
                seed,
                volatility_pct: dec!(1),
                ..Default::default()
            },
        )
        .unwrap();
        (venue, feed)
    }

    #[tokio::test]
    async fn marks_venue_and_stays_within_band() {
        let (venue, feed) = feed(3);
        let sol = venue.registry().resolve("SOL").unwrap().clone();

        let first = feed.fetch_prices(&[sol.clone()]).await.unwrap();
        assert_eq!(first.len(), 1);
        let price = first[0].price;
        assert!(price >= dec!(99) && price <= dec!(101));
        assert_eq!(venue.price(sol.id).await, Some(price));
    }

    #[tokio::test]
    async fn same_seed_same_path() {
        let (venue_a, a) = feed(9);
        let (_, b) = feed(9);
        let sol = venue_a.registry().resolve("SOL").unwrap().clone();
        for _ in 0..20 {
            let pa = a.fetch_prices(&[sol.clone()]).await.unwrap();
            let pb = b.fetch_prices(&[sol.clone()]).await.unwrap();
            assert_eq!(pa[0].price, pb[0].price);
        }
    }

    #[test]
    fn rejects_non_positive_start() {
        let venue =
            Arc::new(PaperVenue::new(InstrumentRegistry::default(), PaperConfig::default()).unwrap());
        let result = SyntheticPriceFeed::new(
            venue,
            SyntheticFeedConfig {
                start_price: Decimal::ZERO,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
