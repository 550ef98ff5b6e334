//! Traits for the collaborators the engine talks to.

pub mod candle_port;
pub mod config_port;
pub mod price_port;
pub mod swap_port;
