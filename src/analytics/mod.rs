//! Series math: rolling stats, spread conversion, candles, correlation.

pub mod candles;
pub mod correlation;
pub mod rolling;
pub mod spread;

pub use candles::{aggregate, aggregate_series, CandleExport, VenueCandles};
pub use correlation::{lagged_correlation, LagCorrelation};
pub use rolling::{zscores, RollingStats, ZScoreMode, DEFAULT_ZSCORE_WINDOW};
pub use spread::{to_price_series, to_spread_series, SpreadSeries};
