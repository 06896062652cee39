//! OHLCV bucket aggregation and export artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Candle, PricePoint, PriceSeries};

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// Candles for both venues over the same interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueCandles {
    pub dex: Vec<Candle>,
    pub cex: Vec<Candle>,
}

/// Aggregate price points into fixed-interval OHLCV candles.
///
/// Points are stably sorted by timestamp first, so open/close follow
/// true time order even when the input arrives shuffled, and ties keep
/// their arrival order. Empty buckets are absent from the output, which
/// is ascending by bucket start.
pub fn aggregate(points: &[PricePoint], interval_ms: i64) -> Vec<Candle> {
    if points.is_empty() || interval_ms <= 0 {
        return Vec::new();
    }

    let mut ordered: Vec<&PricePoint> = points.iter().collect();
    ordered.sort_by_key(|p| p.time_ms);

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for point in ordered {
        let bucket_start = point.time_ms.div_euclid(interval_ms) * interval_ms;
        match buckets.get_mut(&bucket_start) {
            Some(candle) => {
                candle.high = candle.high.max(point.price);
                candle.low = candle.low.min(point.price);
                candle.close = point.price;
                candle.volume += point.volume;
            }
            None => {
                buckets.insert(
                    bucket_start,
                    Candle {
                        time_ms: bucket_start,
                        open: point.price,
                        close: point.price,
                        high: point.price,
                        low: point.price,
                        volume: point.volume,
                    },
                );
            }
        }
    }

    buckets.into_values().collect()
}

pub fn aggregate_series(series: &PriceSeries, interval_ms: i64) -> VenueCandles {
    VenueCandles {
        dex: aggregate(&series.dex, interval_ms),
        cex: aggregate(&series.cex, interval_ms),
    }
}

/// Export header for a candle artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleExportMeta {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub interval_ms: i64,
    pub interval_label: String,
    pub dex_count: usize,
    pub cex_count: usize,
    pub exported_at: DateTime<Utc>,
}

/// Candle artifact: meta block plus both venue series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleExport {
    pub meta: CandleExportMeta,
    pub dex: Vec<Candle>,
    pub cex: Vec<Candle>,
}

pub fn export(candles: VenueCandles, start_ms: i64, end_ms: i64, interval_ms: i64) -> CandleExport {
    CandleExport {
        meta: CandleExportMeta {
            start_time_ms: start_ms,
            end_time_ms: end_ms,
            interval_ms,
            interval_label: interval_label(interval_ms),
            dex_count: candles.dex.len(),
            cex_count: candles.cex.len(),
            exported_at: Utc::now(),
        },
        dex: candles.dex,
        cex: candles.cex,
    }
}

/// Human label for an interval: whole days, then whole hours, then
/// minutes.
pub fn interval_label(interval_ms: i64) -> String {
    if interval_ms >= MS_PER_DAY && interval_ms % MS_PER_DAY == 0 {
        format!("{}d", interval_ms / MS_PER_DAY)
    } else if interval_ms >= MS_PER_HOUR && interval_ms % MS_PER_HOUR == 0 {
        format!("{}h", interval_ms / MS_PER_HOUR)
    } else {
        format!("{}m", (interval_ms / MS_PER_MINUTE).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Venue;

    fn point(time_ms: i64, price: f64, volume: f64) -> PricePoint {
        PricePoint {
            time_ms,
            price,
            volume,
            lat_ms: 100.0,
            venue: Venue::Cex,
        }
    }

    #[test]
    fn test_basic_aggregation() {
        let points = vec![
            point(0, 10.0, 1.0),
            point(30_000, 12.0, 2.0),
            point(59_000, 8.0, 3.0),
            point(60_000, 20.0, 4.0),
        ];
        let candles = aggregate(&points, MS_PER_MINUTE);

        assert_eq!(candles.len(), 2);
        let first = &candles[0];
        assert_eq!(first.time_ms, 0);
        assert_eq!(first.open, 10.0);
        assert_eq!(first.close, 8.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 8.0);
        assert_eq!(first.volume, 6.0);

        let second = &candles[1];
        assert_eq!(second.time_ms, 60_000);
        assert_eq!(second.open, 20.0);
        assert_eq!(second.volume, 4.0);
    }

    #[test]
    fn test_shuffled_input_same_candles() {
        let ordered = vec![
            point(1_000, 10.0, 1.0),
            point(2_000, 11.0, 1.0),
            point(3_000, 9.0, 1.0),
            point(61_000, 15.0, 1.0),
        ];
        let mut shuffled = ordered.clone();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);

        assert_eq!(
            aggregate(&ordered, MS_PER_MINUTE),
            aggregate(&shuffled, MS_PER_MINUTE)
        );
    }

    #[test]
    fn test_sparse_buckets_skipped_and_sorted() {
        let points = vec![
            point(10 * MS_PER_MINUTE, 5.0, 1.0),
            point(0, 1.0, 1.0),
            point(3 * MS_PER_MINUTE, 2.0, 1.0),
        ];
        let candles = aggregate(&points, MS_PER_MINUTE);
        let starts: Vec<i64> = candles.iter().map(|c| c.time_ms).collect();
        assert_eq!(
            starts,
            vec![0, 3 * MS_PER_MINUTE, 10 * MS_PER_MINUTE]
        );
    }

    #[test]
    fn test_volume_conserved() {
        let points: Vec<PricePoint> = (0..100)
            .map(|i| point(i * 7_000, 10.0 + (i % 5) as f64, 2.5))
            .collect();
        let candles = aggregate(&points, MS_PER_MINUTE);
        let total: f64 = candles.iter().map(|c| c.volume).sum();
        assert!((total - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let points: Vec<PricePoint> = (0..240)
            .map(|i| point(i * 27_000, 100.0 + ((i * 13) % 29) as f64, 1.0 + (i % 3) as f64))
            .collect();
        let candles = aggregate(&points, MS_PER_HOUR);

        // expand each candle into points that reproduce it exactly
        let expanded: Vec<PricePoint> = candles
            .iter()
            .flat_map(|c| {
                vec![
                    point(c.time_ms, c.open, c.volume),
                    point(c.time_ms + 1, c.high, 0.0),
                    point(c.time_ms + 2, c.low, 0.0),
                    point(c.time_ms + MS_PER_HOUR - 1, c.close, 0.0),
                ]
            })
            .collect();

        assert_eq!(aggregate(&expanded, MS_PER_HOUR), candles);
    }

    #[test]
    fn test_interval_labels() {
        assert_eq!(interval_label(MS_PER_DAY), "1d");
        assert_eq!(interval_label(7 * MS_PER_DAY), "7d");
        assert_eq!(interval_label(4 * MS_PER_HOUR), "4h");
        assert_eq!(interval_label(15 * MS_PER_MINUTE), "15m");
        assert_eq!(interval_label(30_000), "1m");
    }

    #[test]
    fn test_export_meta_counts() {
        let candles = VenueCandles {
            dex: vec![Candle {
                time_ms: 0,
                open: 1.0,
                close: 1.0,
                high: 1.0,
                low: 1.0,
                volume: 1.0,
            }],
            cex: Vec::new(),
        };
        let artifact = export(candles, 0, MS_PER_DAY, MS_PER_DAY);
        assert_eq!(artifact.meta.dex_count, 1);
        assert_eq!(artifact.meta.cex_count, 0);
        assert_eq!(artifact.meta.interval_label, "1d");
    }
}
