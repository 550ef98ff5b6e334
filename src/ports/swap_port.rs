//! Swap venue port trait: quote, execute and balance lookups.
//!
//! A quote is a priced offer to exchange `input_amount` of one instrument for
//! roughly `output_amount` of another. Executing it is atomic: it either
//! settles and returns the actual amounts or fails with nothing changed.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::error::EngineError;
use crate::domain::instrument::{Instrument, InstrumentId};

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub input: InstrumentId,
    pub output: InstrumentId,
    pub input_amount: Decimal,
    /// Expected output before slippage.
    pub output_amount: Decimal,
    pub max_slippage_bps: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub settlement_ref: String,
}

#[async_trait]
pub trait SwapPort: Send + Sync {
    /// `Ok(None)` when no route exists for the pair or amount.
    async fn quote(
        &self,
        from: &Instrument,
        to: &Instrument,
        amount: Decimal,
        max_slippage_bps: u32,
    ) -> Result<Option<Quote>, EngineError>;

    async fn execute_quote(&self, quote: &Quote) -> Result<Execution, EngineError>;

    async fn current_balance(&self, instrument: &Instrument) -> Result<Decimal, EngineError>;
}
