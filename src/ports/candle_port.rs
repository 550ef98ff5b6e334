//! Historical candle source port trait.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

pub trait CandlePort {
    /// Candles in chronological order.
    fn fetch_candles(&self) -> Result<Vec<Candle>, EngineError>;
}
