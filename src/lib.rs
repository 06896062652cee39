//! ArbScope Engine Library
//!
//! Paired CEX/DEX price analytics: columnar tick ingest, rolling spread
//! statistics, fee-aware signal detection, candle aggregation, lagged
//! correlation and signal-replay backtests, behind an async pipeline.

pub mod analytics;
pub mod backtest;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod signals;
pub mod synthetic;

// Re-export the surface most callers touch at crate root
pub use config::{DetectorConfig, DetectorOverrides, EngineConfig, FeeSchedule};
pub use error::EngineError;
pub use models::{Direction, PricePoint, PriceSeries, Signal, SpreadPoint, TickRecord, Venue};
pub use pipeline::AnalysisPipeline;
