//! # Hedge Engine
//!
//! Keeps the combined exposure of tracked spot and derivative markets
//! offset by orders on designated hedge markets.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Venue seams, the paper venue and external exposure feeds
//! - `strategy`: Exposure aggregation, hedge calculation and the hedge cycle
//! - `utils`: Decimal helpers, map flattening and bounded gathering

pub mod config;
pub mod error;
pub mod exchange;
pub mod strategy;
pub mod utils;

pub use config::AppConfig;
pub use error::HedgeError;
pub use strategy::HedgeEngine;
