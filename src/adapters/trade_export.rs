//! CSV export of backtest trades.

use std::path::Path;

use crate::domain::backtest::BacktestTrade;
use crate::domain::error::EngineError;

const HEADER: [&str; 12] = [
    "entry_time",
    "exit_time",
    "entry_price",
    "exit_price",
    "quantity",
    "capital",
    "proceeds",
    "fees",
    "pnl",
    "return_pct",
    "holding_candles",
    "reason",
];

pub struct TradeExportAdapter;

impl TradeExportAdapter {
    pub fn write<W: std::io::Write>(writer: W, trades: &[BacktestTrade]) -> Result<(), EngineError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(HEADER).map_err(csv_error)?;
        for t in trades {
            wtr.write_record([
                t.entry_time.to_rfc3339(),
                t.exit_time.to_rfc3339(),
                t.entry_price.round_dp(8).to_string(),
                t.exit_price.round_dp(8).to_string(),
                t.quantity.round_dp(8).to_string(),
                t.capital.round_dp(2).to_string(),
                t.proceeds.round_dp(2).to_string(),
                t.fees.round_dp(4).to_string(),
                t.pnl.round_dp(4).to_string(),
                t.return_pct.round_dp(4).to_string(),
                t.holding_candles.to_string(),
                t.reason.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_file<P: AsRef<Path>>(path: P, trades: &[BacktestTrade]) -> Result<(), EngineError> {
        let file = std::fs::File::create(path)?;
        Self::write(file, trades)
    }
}

fn csv_error(e: csv::Error) -> EngineError {
    EngineError::Io(std::io::Error::other(e))
}
