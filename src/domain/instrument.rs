//! Tradable instruments and the fixed startup registry.

use std::fmt;

use rust_decimal::Decimal;

use crate::domain::decimal::round_down;
use crate::domain::error::EngineError;

/// Stable index into the [`InstrumentRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(pub usize);

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    /// On-chain mint or contract address.
    pub address: String,
    pub decimals: u32,
}

impl Instrument {
    /// Truncate an amount to the instrument's precision.
    pub fn normalize(&self, amount: Decimal) -> Decimal {
        round_down(amount, self.decimals)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

const DEFAULT_INSTRUMENTS: &[(&str, &str, u32)] = &[
    ("SOL", "So11111111111111111111111111111111111111112", 9),
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
    ("JUP", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", 6),
    ("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5),
    ("WIF", "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm", 6),
];

/// Symbol every position is funded from and settled back into.
pub const QUOTE_SYMBOL: &str = "USDC";

/// Immutable registry built once at startup; ids are positions in it.
#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    pub fn new(entries: &[(&str, &str, u32)]) -> Self {
        let instruments = entries
            .iter()
            .enumerate()
            .map(|(i, (symbol, address, decimals))| Instrument {
                id: InstrumentId(i),
                symbol: symbol.to_string(),
                address: address.to_string(),
                decimals: *decimals,
            })
            .collect();
        Self { instruments }
    }

    pub fn get(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id.0)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn resolve(&self, symbol: &str) -> Result<&Instrument, EngineError> {
        self.by_symbol(symbol)
            .ok_or_else(|| EngineError::UnknownInstrument {
                symbol: symbol.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn quote_instrument(&self) -> Result<&Instrument, EngineError> {
        self.resolve(QUOTE_SYMBOL)
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUMENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_registry_lookup() {
        let registry = InstrumentRegistry::default();
        let sol = registry.by_symbol("sol").unwrap();
        assert_eq!(sol.symbol, "SOL");
        assert_eq!(sol.decimals, 9);
        assert_eq!(registry.get(sol.id), Some(sol));
    }

    #[test]
    fn resolve_unknown_symbol() {
        let registry = InstrumentRegistry::default();
        let err = registry.resolve("DOGE").unwrap_err();
        assert!(matches!(err, EngineError::UnknownInstrument { .. }));
    }

    #[test]
    fn quote_currency_is_usdc() {
        let registry = InstrumentRegistry::default();
        let usdc = registry.quote_instrument().unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);
    }

    #[test]
    fn normalize_truncates_to_precision() {
        let registry = InstrumentRegistry::default();
        let bonk = registry.by_symbol("BONK").unwrap();
        assert_eq!(bonk.normalize(dec!(1.1234567)), dec!(1.12345));
    }
}
