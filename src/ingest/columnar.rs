//! Columnar JSON dataset: `{ meta, data: [[ts, dexFields, cexFields,
//! priceDiff?], ...] }`.
//!
//! Field positions are part of the format contract: DEX average price
//! sits at venue index 3, CEX close at index 3, CEX volume at index 4,
//! DEX base volume at index 1.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{self, EngineError};
use crate::ingest::IngestStats;
use crate::models::{round_dp, CexSnapshot, DexSnapshot, TickRecord};

/// Both venue arrays carry exactly this many numeric fields.
pub const VENUE_FIELDS: usize = 7;

/// Chart-backing range slices extend one hour past each end so boundary
/// candles and rolling windows have context.
pub const RANGE_MARGIN_MS: i64 = 3_600_000;

/// Dataset header. `start`/`end` pass through untouched because source
/// files carry either epoch numbers or formatted strings there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMeta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub start: Value,
    #[serde(default)]
    pub end: Value,
    #[serde(default)]
    pub columns: Vec<String>,
    /// DEX-side column names.
    #[serde(default)]
    pub u_columns: Vec<String>,
    /// CEX-side column names.
    #[serde(default)]
    pub b_columns: Vec<String>,
}

/// On-disk shape. Rows stay as raw values so one bad row cannot fail
/// the whole file parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnarFile {
    #[serde(default)]
    pub meta: DatasetMeta,
    pub data: Vec<Value>,
}

impl ColumnarFile {
    /// Build a writable dataset from decoded records. Used by the
    /// synthetic generator and test fixtures.
    pub fn from_ticks(ticks: &[TickRecord]) -> Self {
        let meta = DatasetMeta {
            total: ticks.len() as u64,
            start: ticks.first().map(|t| json!(t.timestamp)).unwrap_or(Value::Null),
            end: ticks.last().map(|t| json!(t.timestamp)).unwrap_or(Value::Null),
            columns: vec![
                "timestamp".to_string(),
                "dex".to_string(),
                "cex".to_string(),
                "priceDiff".to_string(),
            ],
            u_columns: vec![
                "swapCount".to_string(),
                "volumeBase".to_string(),
                "volumeQuote".to_string(),
                "avgPrice".to_string(),
                "minPrice".to_string(),
                "maxPrice".to_string(),
                "priceStd".to_string(),
            ],
            b_columns: vec![
                "open".to_string(),
                "high".to_string(),
                "low".to_string(),
                "close".to_string(),
                "volume".to_string(),
                "quoteVolume".to_string(),
                "trades".to_string(),
            ],
        };
        Self {
            meta,
            data: ticks.iter().map(encode_row).collect(),
        }
    }
}

/// Decoded dataset plus its skip accounting.
#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    pub meta: DatasetMeta,
    pub ticks: Vec<TickRecord>,
    pub stats: IngestStats,
}

impl NormalizedDataset {
    /// First and last observation in milliseconds, scanned rather than
    /// trusted from row order.
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        let first = self.ticks.iter().map(TickRecord::time_ms).min()?;
        let last = self.ticks.iter().map(TickRecord::time_ms).max()?;
        Some((first, last))
    }
}

impl TickRecord {
    /// Decode one positional row `[timestamp, dexFields, cexFields,
    /// priceDiff?]`.
    pub fn from_row(row: &Value) -> Result<TickRecord, EngineError> {
        let parts = row
            .as_array()
            .ok_or_else(|| EngineError::MalformedRecord("row is not an array".to_string()))?;
        if parts.len() < 3 {
            return Err(EngineError::MalformedRecord(format!(
                "row has {} elements, expected at least 3",
                parts.len()
            )));
        }

        let timestamp = parts[0]
            .as_i64()
            .or_else(|| parts[0].as_f64().map(|f| f as i64))
            .ok_or_else(|| {
                EngineError::MalformedRecord(format!("timestamp is not a number: {}", parts[0]))
            })?;
        let dex = venue_fields(&parts[1], "dex")?;
        let cex = venue_fields(&parts[2], "cex")?;
        let price_diff = parts.get(3).and_then(Value::as_f64);

        Ok(TickRecord {
            timestamp,
            dex: DexSnapshot {
                swap_count: dex[0],
                volume_base: dex[1],
                volume_quote: dex[2],
                avg_price: dex[3],
                min_price: dex[4],
                max_price: dex[5],
                price_std: dex[6],
            },
            cex: CexSnapshot {
                open: cex[0],
                high: cex[1],
                low: cex[2],
                close: cex[3],
                volume: cex[4],
                quote_volume: cex[5],
                trades: cex[6],
            },
            price_diff,
        })
    }
}

fn venue_fields(value: &Value, venue: &str) -> Result<[f64; VENUE_FIELDS], EngineError> {
    let fields = value
        .as_array()
        .ok_or_else(|| EngineError::MalformedRecord(format!("{venue} fields are not an array")))?;
    if fields.len() < VENUE_FIELDS {
        return Err(EngineError::MalformedRecord(format!(
            "{venue} carries {} fields, expected {}",
            fields.len(),
            VENUE_FIELDS
        )));
    }
    let mut out = [0.0; VENUE_FIELDS];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = fields[i].as_f64().ok_or_else(|| {
            EngineError::MalformedRecord(format!("{venue} field {i} is not numeric"))
        })?;
    }
    Ok(out)
}

/// Inverse of `TickRecord::from_row`.
pub fn encode_row(tick: &TickRecord) -> Value {
    json!([
        tick.timestamp,
        [
            tick.dex.swap_count,
            tick.dex.volume_base,
            tick.dex.volume_quote,
            tick.dex.avg_price,
            tick.dex.min_price,
            tick.dex.max_price,
            tick.dex.price_std,
        ],
        [
            tick.cex.open,
            tick.cex.high,
            tick.cex.low,
            tick.cex.close,
            tick.cex.volume,
            tick.cex.quote_volume,
            tick.cex.trades,
        ],
        tick.price_diff,
    ])
}

/// Decode a row batch, skipping and counting failures.
pub fn decode_rows(rows: &[Value]) -> (Vec<TickRecord>, IngestStats) {
    let mut stats = IngestStats::default();
    let mut ticks = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        stats.rows_seen += 1;
        match TickRecord::from_row(row) {
            Ok(tick) => ticks.push(tick),
            Err(err) => {
                stats.rows_skipped += 1;
                debug!(index, %err, "skipping malformed row");
            }
        }
    }
    (ticks, stats)
}

/// Read and decode a columnar dataset file.
///
/// File-level failures (missing file, invalid JSON envelope) propagate;
/// row-level failures are absorbed into the stats.
pub fn load_dataset(path: &Path) -> Result<NormalizedDataset, EngineError> {
    let raw = fs::read_to_string(path).map_err(|e| error::io(path, e))?;
    let file: ColumnarFile = serde_json::from_str(&raw).map_err(|e| error::json(path, e))?;
    let (ticks, stats) = decode_rows(&file.data);

    info!(
        path = %path.display(),
        rows = stats.rows_seen,
        skipped = stats.rows_skipped,
        "Dataset loaded"
    );

    Ok(NormalizedDataset {
        meta: file.meta,
        ticks,
        stats,
    })
}

/// Keep records whose time falls inside `[start - margin, end + margin]`,
/// both ends inclusive.
pub fn filter_by_time(
    ticks: &[TickRecord],
    start_ms: i64,
    end_ms: i64,
    margin_ms: i64,
) -> Vec<TickRecord> {
    let lo = start_ms - margin_ms;
    let hi = end_ms + margin_ms;
    ticks
        .iter()
        .filter(|t| {
            let ms = t.time_ms();
            ms >= lo && ms <= hi
        })
        .cloned()
        .collect()
}

/// Headline dataset figures for logs and the inspection tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub total_rows: u64,
    pub skipped_rows: u64,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    /// Rows with at least one DEX swap.
    pub dex_active_rows: u64,
    /// Rows with a usable CEX close.
    pub cex_active_rows: u64,
    pub avg_swap_count: f64,
    /// Mean CEX close minus DEX average price over rows where both
    /// venues are usable.
    pub avg_price_diff: f64,
}

pub fn summarize(dataset: &NormalizedDataset) -> DatasetSummary {
    let bounds = dataset.time_bounds();
    let mut dex_active = 0u64;
    let mut cex_active = 0u64;
    let mut swap_sum = 0.0;
    let mut diff_sum = 0.0;
    let mut diff_count = 0u64;

    for tick in &dataset.ticks {
        if tick.dex.swap_count > 0.0 {
            dex_active += 1;
        }
        if tick.cex.close > 0.0 {
            cex_active += 1;
        }
        swap_sum += tick.dex.swap_count;
        if tick.cex.close > 0.0 && tick.dex.avg_price > 0.0 {
            diff_sum += tick.cex.close - tick.dex.avg_price;
            diff_count += 1;
        }
    }

    let count = dataset.ticks.len() as f64;
    DatasetSummary {
        total_rows: dataset.stats.rows_seen,
        skipped_rows: dataset.stats.rows_skipped,
        start_ms: bounds.map(|(s, _)| s),
        end_ms: bounds.map(|(_, e)| e),
        dex_active_rows: dex_active,
        cex_active_rows: cex_active,
        avg_swap_count: if count > 0.0 {
            round_dp(swap_sum / count, 4)
        } else {
            0.0
        },
        avg_price_diff: if diff_count > 0 {
            round_dp(diff_sum / diff_count as f64, 4)
        } else {
            0.0
        },
    }
}

/// Count adjacent pairs that run backwards in time. The format promises
/// ascending order; this is the check behind `dataset_inspect verify`.
pub fn count_ordering_violations(ticks: &[TickRecord]) -> usize {
    ticks
        .windows(2)
        .filter(|pair| pair[0].timestamp > pair[1].timestamp)
        .count()
}
