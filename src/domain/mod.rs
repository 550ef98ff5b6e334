//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod config_validation;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod indicator_engine;
pub mod instrument;
pub mod ledger;
pub mod metrics;
pub mod position;
pub mod price_window;
pub mod risk;
pub mod scheduler;
pub mod signal;
pub mod statistics;
pub mod strategy;
