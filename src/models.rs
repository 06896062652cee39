use serde::{Deserialize, Serialize};

/// Trading venues for a paired observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Cex,
    Dex,
}

impl Venue {
    pub fn as_str(&self) -> &str {
        match self {
            Venue::Cex => "cex",
            Venue::Dex => "dex",
        }
    }

    /// Reporting latency assumed for chart alignment, in milliseconds.
    pub fn default_latency_ms(&self) -> f64 {
        match self {
            Venue::Cex => 100.0,
            Venue::Dex => 200.0,
        }
    }
}

/// Aggregated DEX activity for one interval.
///
/// Field order mirrors the columnar dataset layout: `[swap_count,
/// volume_base, volume_quote, avg_price, min_price, max_price, price_std]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DexSnapshot {
    pub swap_count: f64,
    pub volume_base: f64,
    pub volume_quote: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_std: f64,
}

/// CEX kline for the same interval: `[open, high, low, close, volume,
/// quote_volume, trades]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CexSnapshot {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades: f64,
}

/// One normalized observation joining both venues at a shared timestamp.
///
/// Timestamps are epoch seconds at this layer; derived series carry
/// milliseconds. Duplicate timestamps are allowed, ordering is ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp: i64,
    pub dex: DexSnapshot,
    pub cex: CexSnapshot,
    /// Raw price difference carried by some dataset rows.
    pub price_diff: Option<f64>,
}

impl TickRecord {
    pub fn time_ms(&self) -> i64 {
        self.timestamp * 1000
    }
}

/// Chart-ready price observation. Serialized keys follow the artifact
/// format consumed downstream (`t`, `p`, `v`, `lat_ms`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "t")]
    pub time_ms: i64,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    pub lat_ms: f64,
    pub venue: Venue,
}

/// Per-venue price series split out of the tick stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub cex: Vec<PricePoint>,
    pub dex: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn is_empty(&self) -> bool {
        self.cex.is_empty() && self.dex.is_empty()
    }

    pub fn venue(&self, venue: Venue) -> &[PricePoint] {
        match venue {
            Venue::Cex => &self.cex,
            Venue::Dex => &self.dex,
        }
    }
}

/// One derived spread observation.
///
/// `spread` is CEX minus DEX; `spread_pct` is the fraction of the CEX
/// price. `volume` combines both venues (CEX base volume plus DEX base
/// volume).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadPoint {
    #[serde(rename = "t")]
    pub time_ms: i64,
    pub spread: f64,
    pub spread_pct: f64,
    #[serde(rename = "z")]
    pub z_score: f64,
    pub cex_price: f64,
    pub dex_price: f64,
    pub volume: f64,
}

/// Trade direction for a detected opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "CEX->DEX")]
    CexToDex,
    #[serde(rename = "DEX->CEX")]
    DexToCex,
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::CexToDex => "CEX->DEX",
            Direction::DexToCex => "DEX->CEX",
        }
    }

    /// Positive spread means the CEX side is rich, so sell there and buy
    /// on the DEX side.
    pub fn from_spread(spread: f64) -> Self {
        if spread > 0.0 {
            Direction::CexToDex
        } else {
            Direction::DexToCex
        }
    }
}

/// A detected or imported trading opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    #[serde(rename = "t")]
    pub time_ms: i64,
    pub direction: Direction,
    pub spread: f64,
    pub spread_pct: f64,
    pub z_score: f64,
    /// Simulated fill size in base units.
    pub size: f64,
    pub gross_profit: f64,
    pub total_cost: f64,
    pub net_profit: f64,
    pub confidence: f64,
    pub cex_price: f64,
    pub dex_price: f64,
    /// Free-form provenance: detector runs snapshot their config, file
    /// imports record the source row.
    pub params: serde_json::Value,
}

/// Fixed-interval OHLCV bucket. `time` is the bucket start in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "time")]
    pub time_ms: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

/// Round to `dp` decimal places. Chart-facing outputs are rounded at
/// construction; internal accumulators never are.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}
