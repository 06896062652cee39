//! Precomputed daily candle file, the fast path that skips live
//! aggregation when it covers the requested range.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::analytics::candles::{VenueCandles, MS_PER_DAY};
use crate::error::{self, EngineError};
use crate::models::Candle;

/// `{ meta, dex: Candle[], cex: Candle[] }` with daily buckets. `meta`
/// is generator provenance and passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleFile {
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub dex: Vec<Candle>,
    #[serde(default)]
    pub cex: Vec<Candle>,
}

impl CandleFile {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path).map_err(|e| error::io(path, e))?;
        let file: CandleFile = serde_json::from_str(&raw).map_err(|e| error::json(path, e))?;
        info!(
            path = %path.display(),
            dex = file.dex.len(),
            cex = file.cex.len(),
            "Candle file loaded"
        );
        Ok(file)
    }

    /// A daily candle spans `[time, time + 1 day)`; keep every candle
    /// whose day overlaps the request at all.
    pub fn filter_range(&self, start_ms: i64, end_ms: i64) -> VenueCandles {
        let keep = |candles: &[Candle]| -> Vec<Candle> {
            candles
                .iter()
                .filter(|c| {
                    let day_start = c.time_ms;
                    let day_end = day_start + MS_PER_DAY - 1;
                    day_start <= end_ms && day_end >= start_ms
                })
                .copied()
                .collect()
        };
        VenueCandles {
            dex: keep(&self.dex),
            cex: keep(&self.cex),
        }
    }

    /// True when both venues carry candles and their combined day span
    /// encloses the requested range.
    pub fn covers(&self, start_ms: i64, end_ms: i64) -> bool {
        let span = |candles: &[Candle]| -> Option<(i64, i64)> {
            let first = candles.iter().map(|c| c.time_ms).min()?;
            let last = candles.iter().map(|c| c.time_ms).max()?;
            Some((first, last + MS_PER_DAY - 1))
        };
        match (span(&self.dex), span(&self.cex)) {
            (Some((dex_lo, dex_hi)), Some((cex_lo, cex_hi))) => {
                dex_lo <= start_ms && dex_hi >= end_ms && cex_lo <= start_ms && cex_hi >= end_ms
            }
            _ => false,
        }
    }
}
