//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod paper_venue;
pub mod synthetic_feed;
pub mod trade_export;
