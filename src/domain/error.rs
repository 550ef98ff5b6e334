//! Domain error types.

/// Top-level error type for autotrader.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown instrument: {symbol}")]
    UnknownInstrument { symbol: String },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error("candle data error: {reason}")]
    CandleData { reason: String },

    #[error("insufficient candles: have {candles}, need {minimum}")]
    InsufficientData { candles: usize, minimum: usize },

    #[error("no quote available for {from} -> {to} ({amount})")]
    QuoteUnavailable {
        from: String,
        to: String,
        amount: rust_decimal::Decimal,
    },

    #[error("execution failed for {instrument}: {reason}")]
    Execution { instrument: String, reason: String },

    /// A close leg failed after the opening leg settled; the position stays open.
    #[error("close failed for position {position_id} ({instrument}), exposure remains open: {reason}")]
    UnresolvedExposure {
        position_id: u64,
        instrument: String,
        reason: String,
    },

    /// A buy settled at the venue but could not be booked as a position.
    #[error("fill {settlement_ref} for {instrument} settled but was not booked: {reason}")]
    UnbookedFill {
        instrument: String,
        settlement_ref: String,
        reason: String,
    },

    #[error("balance query failed for {instrument}: {reason}")]
    Balance { instrument: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Errors that only affect the current cycle and are retried on the next one.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::PriceData { .. }
                | EngineError::QuoteUnavailable { .. }
                | EngineError::Execution { .. }
                | EngineError::Balance { .. }
        )
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. }
            | EngineError::UnknownInstrument { .. } => 2,
            EngineError::PriceData { .. }
            | EngineError::CandleData { .. }
            | EngineError::InsufficientData { .. } => 5,
            EngineError::QuoteUnavailable { .. }
            | EngineError::Execution { .. }
            | EngineError::UnresolvedExposure { .. }
            | EngineError::UnbookedFill { .. }
            | EngineError::Balance { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
