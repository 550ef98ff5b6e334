//! CSV candle file adapter.
//!
//! Columns: `timestamp,open,high,low,close,volume`. The timestamp is either
//! RFC 3339 or unix seconds. Rows are returned sorted by time.

use crate::domain::candle::Candle;
use crate::domain::decimal::parse_decimal;
use crate::domain::error::EngineError;
use crate::ports::candle_port::CandlePort;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| EngineError::CandleData {
                reason: format!("timestamp out of range: {}", raw),
            });
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::CandleData {
            reason: format!("invalid timestamp {:?}: {}", raw, e),
        })
}

fn field(record: &csv::StringRecord, index: usize, name: &str, row: usize) -> Result<Decimal, EngineError> {
    let raw = record.get(index).ok_or_else(|| EngineError::CandleData {
        reason: format!("row {}: missing {} column", row, name),
    })?;
    parse_decimal(raw).ok_or_else(|| EngineError::CandleData {
        reason: format!("row {}: invalid {} value {:?}", row, name, raw),
    })
}

impl CandlePort for CsvAdapter {
    fn fetch_candles(&self) -> Result<Vec<Candle>, EngineError> {
        let content = fs::read_to_string(&self.path).map_err(|e| EngineError::CandleData {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let row = i + 2;
            let record = result.map_err(|e| EngineError::CandleData {
                reason: format!("CSV parse error: {}", e),
            })?;

            let timestamp = parse_timestamp(record.get(0).ok_or_else(|| EngineError::CandleData {
                reason: format!("row {}: missing timestamp column", row),
            })?)?;

            let candle = Candle {
                timestamp,
                open: field(&record, 1, "open", row)?,
                high: field(&record, 2, "high", row)?,
                low: field(&record, 3, "low", row)?,
                close: field(&record, 4, "close", row)?,
                volume: field(&record, 5, "volume", row)?,
            };
            if !candle.is_consistent() {
                return Err(EngineError::CandleData {
                    reason: format!("row {}: inconsistent high/low/open/close", row),
                });
            }
            candles.push(candle);
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn write_csv(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SOL_hourly.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn fetch_candles_returns_correct_data() {
        let (_dir, path) = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-15T00:00:00Z,100.0,110.0,90.0,105.0,50000\n\
             2024-01-15T01:00:00Z,105.0,115.0,100.0,110.0,60000\n\
             2024-01-15T02:00:00Z,110.0,120.0,105.0,115.0,55000\n",
        );
        let candles = CsvAdapter::new(path).fetch_candles().unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(
            candles[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(candles[0].open, dec!(100.0));
        assert_eq!(candles[0].high, dec!(110.0));
        assert_eq!(candles[0].low, dec!(90.0));
        assert_eq!(candles[0].close, dec!(105.0));
        assert_eq!(candles[0].volume, dec!(50000));
    }

    #[test]
    fn accepts_unix_seconds_and_sorts() {
        let (_dir, path) = write_csv(
            "timestamp,open,high,low,close,volume\n\
             1704070800,2,2,2,2,1\n\
             1704067200,1,1,1,1,1\n",
        );
        let candles = CsvAdapter::new(path).fetch_candles().unwrap();
        assert_eq!(candles[0].close, dec!(1));
        assert_eq!(
            candles[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(candles[1].close, dec!(2));
    }

    #[test]
    fn invalid_price_is_reported_with_row() {
        let (_dir, path) = write_csv(
            "timestamp,open,high,low,close,volume\n\
             1704067200,1,1,1,abc,1\n",
        );
        let err = CsvAdapter::new(path).fetch_candles().unwrap_err();
        assert!(err.to_string().contains("row 2"));
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn inconsistent_candle_is_rejected() {
        let (_dir, path) = write_csv(
            "timestamp,open,high,low,close,volume\n\
             1704067200,100,95,90,100,1\n",
        );
        assert!(matches!(
            CsvAdapter::new(path).fetch_candles(),
            Err(EngineError::CandleData { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().join("nope.csv"));
        assert!(adapter.fetch_candles().is_err());
    }
}
