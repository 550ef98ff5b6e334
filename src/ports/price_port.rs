//! Live price feed port trait.

use async_trait::async_trait;

use crate::domain::error::EngineError;
use crate::domain::instrument::Instrument;
use crate::domain::price_window::PriceObservation;

#[async_trait]
pub trait PricePort: Send + Sync {
    /// One batched request for every instrument. Instruments the source has
    /// no price for are omitted from the result rather than failing the batch.
    async fn fetch_prices(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceObservation>, EngineError>;
}
