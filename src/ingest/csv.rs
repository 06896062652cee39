//! Imports signal exports from the delimited archive format.
//!
//! The export carries executed opportunities with venue prices, the fee
//! breakdown, and realized profit, but neither z-score nor fill size;
//! those two take documented defaults.

use std::path::Path;

use serde_json::json;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::ingest::IngestStats;
use crate::models::{
    round_dp, Direction, PricePoint, PriceSeries, Signal, SpreadPoint, Venue,
};

/// The export has no z-score column; imported signals sit at the
/// default detection threshold.
pub const DEFAULT_IMPORT_ZSCORE: f64 = 2.0;
/// The export has no size column either.
pub const DEFAULT_IMPORT_SIZE: f64 = 1000.0;

/// Header positions resolved once per file. Every listed column must be
/// present; rows are then read positionally.
struct ColumnIndex {
    id: usize,
    timestamp: usize,
    time_bucket: usize,
    direction: usize,
    price_difference: usize,
    binance_close_price: usize,
    uniswap_avg_price: usize,
    gross_profit: usize,
    binance_fee: usize,
    uniswap_fee: usize,
    gas_cost: usize,
    net_profit: usize,
    confidence: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &::csv::StringRecord) -> Result<Self, EngineError> {
        let find = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                EngineError::MalformedRecord(format!("csv header is missing column '{name}'"))
            })
        };
        Ok(Self {
            id: find("id")?,
            timestamp: find("timestamp")?,
            time_bucket: find("time_bucket")?,
            direction: find("direction")?,
            price_difference: find("price_difference")?,
            binance_close_price: find("binance_close_price")?,
            uniswap_avg_price: find("uniswap_avg_price")?,
            gross_profit: find("gross_profit")?,
            binance_fee: find("binance_fee")?,
            uniswap_fee: find("uniswap_fee")?,
            gas_cost: find("gas_cost")?,
            net_profit: find("net_profit")?,
            confidence: find("confidence")?,
        })
    }
}

/// Imported signals plus the usual skip accounting.
#[derive(Debug, Clone)]
pub struct CsvImport {
    pub signals: Vec<Signal>,
    pub stats: IngestStats,
}

/// Read a signal export. A bad header is fatal; bad rows are skipped
/// and counted.
pub fn load_signals(path: &Path) -> Result<CsvImport, EngineError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::from_headers(&headers)?;

    let mut stats = IngestStats::default();
    let mut signals = Vec::new();
    for (row, result) in reader.records().enumerate() {
        stats.rows_seen += 1;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                stats.rows_skipped += 1;
                debug!(row, %err, "skipping unreadable csv row");
                continue;
            }
        };
        if record.len() != headers.len() {
            stats.rows_skipped += 1;
            debug!(
                row,
                expected = headers.len(),
                got = record.len(),
                "skipping csv row with mismatched field count"
            );
            continue;
        }
        match convert_row(&index, &record) {
            Ok(signal) => signals.push(signal),
            Err(err) => {
                stats.rows_skipped += 1;
                debug!(row, %err, "skipping unconvertible csv row");
            }
        }
    }

    info!(
        path = %path.display(),
        rows = stats.rows_seen,
        skipped = stats.rows_skipped,
        "Signal csv imported"
    );

    Ok(CsvImport { signals, stats })
}

fn text<'a>(
    record: &'a ::csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'a str, EngineError> {
    record
        .get(idx)
        .ok_or_else(|| EngineError::MalformedRecord(format!("column '{name}' is absent")))
}

fn numeric(record: &::csv::StringRecord, idx: usize, name: &str) -> Result<f64, EngineError> {
    let raw = text(record, idx, name)?;
    raw.parse::<f64>().map_err(|_| {
        EngineError::MalformedRecord(format!("column '{name}' is not numeric: '{raw}'"))
    })
}

fn convert_row(index: &ColumnIndex, record: &::csv::StringRecord) -> Result<Signal, EngineError> {
    let raw_id = text(record, index.id, "id")?;
    let timestamp = {
        let raw = text(record, index.timestamp, "timestamp")?;
        raw.parse::<i64>().map_err(|_| {
            EngineError::MalformedRecord(format!("column 'timestamp' is not an integer: '{raw}'"))
        })?
    };
    let direction = if text(record, index.direction, "direction")? == "sell" {
        Direction::CexToDex
    } else {
        Direction::DexToCex
    };

    let spread = numeric(record, index.price_difference, "price_difference")?;
    let cex_price = numeric(record, index.binance_close_price, "binance_close_price")?;
    let dex_price = numeric(record, index.uniswap_avg_price, "uniswap_avg_price")?;
    let reference = cex_price.max(dex_price);
    let spread_pct = if reference > f64::EPSILON {
        round_dp(spread.abs() / reference, 6)
    } else {
        0.0
    };

    let total_cost = numeric(record, index.binance_fee, "binance_fee")?
        + numeric(record, index.uniswap_fee, "uniswap_fee")?
        + numeric(record, index.gas_cost, "gas_cost")?;

    Ok(Signal {
        id: format!("real_{raw_id}"),
        time_ms: timestamp * 1000,
        direction,
        spread,
        spread_pct,
        z_score: DEFAULT_IMPORT_ZSCORE,
        size: DEFAULT_IMPORT_SIZE,
        gross_profit: numeric(record, index.gross_profit, "gross_profit")?,
        total_cost: round_dp(total_cost, 2),
        net_profit: numeric(record, index.net_profit, "net_profit")?,
        confidence: numeric(record, index.confidence, "confidence")?,
        cex_price,
        dex_price,
        params: json!({
            "source": "csv",
            "originalId": raw_id,
            "timeBucket": text(record, index.time_bucket, "time_bucket")?,
        }),
    })
}

/// Rebuild chart-backing series from imported signals: each signal
/// contributes one point per venue, with its size standing in for
/// volume. Output is sorted by time.
pub fn series_from_signals(signals: &[Signal]) -> (PriceSeries, Vec<SpreadPoint>) {
    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by_key(|s| s.time_ms);

    let mut series = PriceSeries::default();
    let mut spreads = Vec::with_capacity(ordered.len());
    for signal in ordered {
        series.cex.push(PricePoint {
            time_ms: signal.time_ms,
            price: signal.cex_price,
            volume: signal.size,
            lat_ms: Venue::Cex.default_latency_ms(),
            venue: Venue::Cex,
        });
        series.dex.push(PricePoint {
            time_ms: signal.time_ms,
            price: signal.dex_price,
            volume: signal.size,
            lat_ms: Venue::Dex.default_latency_ms(),
            venue: Venue::Dex,
        });
        spreads.push(SpreadPoint {
            time_ms: signal.time_ms,
            spread: signal.spread,
            spread_pct: signal.spread_pct,
            z_score: signal.z_score,
            cex_price: signal.cex_price,
            dex_price: signal.dex_price,
            volume: signal.size,
        });
    }
    (series, spreads)
}
