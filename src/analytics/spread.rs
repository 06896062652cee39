//! Tick-to-series conversion.
//!
//! This is the seconds-to-milliseconds boundary: `TickRecord` carries
//! epoch seconds, everything derived here carries milliseconds.

use serde::{Deserialize, Serialize};

use crate::analytics::rolling::{zscores, ZScoreMode};
use crate::models::{round_dp, PricePoint, PriceSeries, SpreadPoint, TickRecord, Venue};

/// Spread points plus the z-score strategy that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSeries {
    pub mode: ZScoreMode,
    pub points: Vec<SpreadPoint>,
}

impl SpreadSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Split ticks into per-venue chart series.
///
/// A row with a missing or zero price on one venue still contributes to
/// the other venue's series.
pub fn to_price_series(ticks: &[TickRecord]) -> PriceSeries {
    let mut series = PriceSeries::default();
    for tick in ticks {
        let time_ms = tick.time_ms();
        if tick.cex.close > 0.0 {
            series.cex.push(PricePoint {
                time_ms,
                price: round_dp(tick.cex.close, 2),
                volume: round_dp(tick.cex.volume, 2),
                lat_ms: Venue::Cex.default_latency_ms(),
                venue: Venue::Cex,
            });
        }
        if tick.dex.avg_price > 0.0 {
            series.dex.push(PricePoint {
                time_ms,
                price: round_dp(tick.dex.avg_price, 2),
                volume: round_dp(tick.dex.volume_base, 2),
                lat_ms: Venue::Dex.default_latency_ms(),
                venue: Venue::Dex,
            });
        }
    }
    series
}

/// Build the spread series with the chosen z-score strategy.
///
/// Only rows where both venue prices are valid produce a point; the
/// z-score scan runs over exactly that filtered sequence, in order.
pub fn to_spread_series(ticks: &[TickRecord], mode: ZScoreMode) -> SpreadSeries {
    let valid: Vec<&TickRecord> = ticks
        .iter()
        .filter(|t| t.cex.close > 0.0 && t.dex.avg_price > 0.0)
        .collect();

    let spreads: Vec<f64> = valid
        .iter()
        .map(|t| t.cex.close - t.dex.avg_price)
        .collect();
    let scores = zscores(&spreads, mode);

    let points = valid
        .iter()
        .zip(scores)
        .map(|(tick, z)| {
            let spread = tick.cex.close - tick.dex.avg_price;
            SpreadPoint {
                time_ms: tick.time_ms(),
                spread: round_dp(spread, 2),
                spread_pct: round_dp(spread / tick.cex.close, 6),
                z_score: round_dp(z, 4),
                cex_price: round_dp(tick.cex.close, 2),
                dex_price: round_dp(tick.dex.avg_price, 2),
                volume: round_dp(tick.cex.volume + tick.dex.volume_base, 2),
            }
        })
        .collect();

    SpreadSeries { mode, points }
}
