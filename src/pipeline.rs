//! Engine facade: wires a tick source, the dispatcher, and the
//! transforms into the operations the presentation layer consumes.

use std::sync::Arc;

use tracing::info;

use crate::analytics::candles::{self, VenueCandles, MS_PER_DAY};
use crate::analytics::correlation::{lagged_correlation, LagCorrelation};
use crate::analytics::rolling::ZScoreMode;
use crate::analytics::spread::{to_price_series, to_spread_series, SpreadSeries};
use crate::backtest::{self, BacktestConfig, BacktestReport};
use crate::config::DetectorConfig;
use crate::dispatch::{Dispatcher, StatsSnapshot};
use crate::error::EngineError;
use crate::ingest::candle_file::CandleFile;
use crate::ingest::columnar::{self, DatasetSummary, RANGE_MARGIN_MS};
use crate::ingest::source::TickSource;
use crate::models::{PriceSeries, Signal};
use crate::signals::SignalDetector;

/// One assembled engine: a tick source behind the cache, a dispatcher,
/// and the analytic transforms.
///
/// Chart-backing operations (`raw_series`, `candles`) pad the requested
/// range by one hour per side so boundary buckets have context;
/// detection and correlation use the exact range.
pub struct AnalysisPipeline {
    source: Arc<dyn TickSource>,
    dispatcher: Dispatcher,
    zscore_mode: ZScoreMode,
    candle_file: Option<Arc<CandleFile>>,
    backtest: BacktestConfig,
}

impl AnalysisPipeline {
    pub fn new(source: Arc<dyn TickSource>) -> Self {
        Self {
            source,
            dispatcher: Dispatcher::from_runtime(),
            zscore_mode: ZScoreMode::default(),
            candle_file: None,
            backtest: BacktestConfig::default(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_zscore_mode(mut self, mode: ZScoreMode) -> Self {
        self.zscore_mode = mode;
        self
    }

    /// Attach a precomputed daily candle file as the aggregation fast
    /// path.
    pub fn with_candle_file(mut self, file: CandleFile) -> Self {
        self.candle_file = Some(Arc::new(file));
        self
    }

    pub fn with_backtest_config(mut self, config: BacktestConfig) -> Self {
        self.backtest = config;
        self
    }

    pub fn dispatcher_stats(&self) -> StatsSnapshot {
        self.dispatcher.stats()
    }

    /// Drop the cached dataset; the next operation rereads the source.
    pub fn invalidate(&self) {
        self.source.invalidate();
    }

    /// Chart-backing price and spread series for a range. The two
    /// conversions run as independent dispatcher jobs.
    pub async fn raw_series(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<(PriceSeries, SpreadSeries), EngineError> {
        let dataset = self.source.load().await?;
        let filtered =
            columnar::filter_by_time(&dataset.ticks, start_ms, end_ms, RANGE_MARGIN_MS);
        if filtered.is_empty() {
            return Ok((
                PriceSeries::default(),
                SpreadSeries {
                    mode: self.zscore_mode,
                    points: Vec::new(),
                },
            ));
        }

        let price_input = filtered.clone();
        let price_task = self
            .dispatcher
            .submit("convert_price_series", move || to_price_series(&price_input));
        let mode = self.zscore_mode;
        let spread_task = self
            .dispatcher
            .submit("convert_spread_series", move || {
                to_spread_series(&filtered, mode)
            });

        let prices = price_task.join().await;
        let spreads = spread_task.join().await;
        Ok((prices, spreads))
    }

    /// Detect signals over the exact range with a validated config.
    pub async fn signals(
        &self,
        start_ms: i64,
        end_ms: i64,
        config: DetectorConfig,
    ) -> Result<Vec<Signal>, EngineError> {
        config.validate()?;
        let dataset = self.source.load().await?;
        let filtered = columnar::filter_by_time(&dataset.ticks, start_ms, end_ms, 0);
        let mode = self.zscore_mode;

        let task = self.dispatcher.submit("detect_signals", move || {
            let spreads = to_spread_series(&filtered, mode);
            SignalDetector::new(config).detect_parallel(&spreads.points)
        });
        Ok(task.join().await)
    }

    /// Candles for a range. Daily requests covered by an attached
    /// precomputed file skip live aggregation entirely.
    pub async fn candles(
        &self,
        start_ms: i64,
        end_ms: i64,
        interval_ms: i64,
    ) -> Result<VenueCandles, EngineError> {
        if let Some(file) = &self.candle_file {
            if interval_ms == MS_PER_DAY && file.covers(start_ms, end_ms) {
                info!(start_ms, end_ms, "serving candles from the precomputed daily file");
                return Ok(file.filter_range(start_ms, end_ms));
            }
        }

        let dataset = self.source.load().await?;
        let filtered =
            columnar::filter_by_time(&dataset.ticks, start_ms, end_ms, RANGE_MARGIN_MS);
        let task = self.dispatcher.submit("aggregate_candles", move || {
            let series = to_price_series(&filtered);
            candles::aggregate_series(&series, interval_ms)
        });
        Ok(task.join().await)
    }

    /// Lagged CEX/DEX price correlation over rows where both venues
    /// have a usable price.
    pub async fn correlation(
        &self,
        start_ms: i64,
        end_ms: i64,
        max_lag: usize,
    ) -> Result<Vec<LagCorrelation>, EngineError> {
        let dataset = self.source.load().await?;
        let filtered = columnar::filter_by_time(&dataset.ticks, start_ms, end_ms, 0);

        let task = self.dispatcher.submit("lagged_correlation", move || {
            let (cex, dex): (Vec<f64>, Vec<f64>) = filtered
                .iter()
                .filter(|t| t.cex.close > 0.0 && t.dex.avg_price > 0.0)
                .map(|t| (t.cex.close, t.dex.avg_price))
                .unzip();
            lagged_correlation(&cex, &dex, max_lag)
        });
        Ok(task.join().await)
    }

    /// Replay signals against the configured initial capital.
    pub fn backtest(&self, signals: &[Signal]) -> BacktestReport {
        backtest::evaluate(signals, &self.backtest)
    }

    /// Headline dataset figures, loading the source if needed.
    pub async fn summary(&self) -> Result<DatasetSummary, EngineError> {
        let dataset = self.source.load().await?;
        Ok(columnar::summarize(&dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::StaticSource;
    use crate::models::{Candle, CexSnapshot, DexSnapshot, TickRecord};

    fn tick(timestamp: i64, dex_price: f64, cex_close: f64) -> TickRecord {
        TickRecord {
            timestamp,
            dex: DexSnapshot {
                swap_count: 2.0,
                volume_base: 5000.0,
                volume_quote: 5000.0 * dex_price,
                avg_price: dex_price,
                min_price: dex_price,
                max_price: dex_price,
                price_std: 0.0,
            },
            cex: CexSnapshot {
                open: cex_close,
                high: cex_close + 1.0,
                low: cex_close - 1.0,
                close: cex_close,
                volume: 8000.0,
                quote_volume: 0.0,
                trades: 10.0,
            },
            price_diff: None,
        }
    }

    fn pipeline_over(ticks: Vec<TickRecord>) -> AnalysisPipeline {
        AnalysisPipeline::new(Arc::new(StaticSource::from_ticks(ticks)))
            .with_dispatcher(Dispatcher::inline())
    }

    #[tokio::test]
    async fn test_raw_series_pads_the_range_one_hour() {
        // Neighbors sit 30 minutes outside the requested range
        let ticks = vec![
            tick(10_000, 2580.0, 2579.0),
            tick(10_000 + 1800, 2580.0, 2579.0),
            tick(10_000 + 3600, 2580.0, 2579.0),
        ];
        let pipeline = pipeline_over(ticks);

        let mid = (10_000 + 1800) * 1000;
        let (prices, spreads) = pipeline.raw_series(mid, mid).await.unwrap();
        assert_eq!(prices.cex.len(), 3);
        assert_eq!(prices.dex.len(), 3);
        assert_eq!(spreads.len(), 3);
    }

    #[tokio::test]
    async fn test_signals_use_the_exact_range() {
        let ticks = vec![
            tick(10_000, 2580.0, 2579.0),
            tick(10_000 + 1800, 2580.0, 2579.0),
        ];
        let pipeline = pipeline_over(ticks);

        // With an impossible volume floor nothing can qualify, but the
        // call itself must stay well-formed on the narrow range.
        let config = DetectorConfig {
            volume_min: 1_000_000.0,
            ..DetectorConfig::default()
        };
        let signals = pipeline
            .signals(10_000_000, 10_000_000, config)
            .await
            .unwrap();
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_detector_config_rejected() {
        let pipeline = pipeline_over(vec![tick(10_000, 2580.0, 2579.0)]);
        let config = DetectorConfig {
            price_threshold: f64::NAN,
            ..DetectorConfig::default()
        };
        let err = pipeline.signals(0, 20_000_000, config).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_candle_file_fast_path_for_daily_interval() {
        let day0 = tick(10, 2580.0, 2579.0);
        let marker = Candle {
            time_ms: 0,
            open: 1111.0,
            close: 1111.0,
            high: 1111.0,
            low: 1111.0,
            volume: 1.0,
        };
        let file = CandleFile {
            meta: serde_json::Value::Null,
            dex: vec![marker],
            cex: vec![marker],
        };
        let pipeline = pipeline_over(vec![day0]).with_candle_file(file);

        // Daily interval inside the file's day: served from the file
        let daily = pipeline.candles(1_000, 2_000, MS_PER_DAY).await.unwrap();
        assert_eq!(daily.dex[0].close, 1111.0);

        // Hourly interval falls through to live aggregation
        let hourly = pipeline
            .candles(1_000, 2_000, candles::MS_PER_HOUR)
            .await
            .unwrap();
        assert_eq!(hourly.dex[0].close, 2580.0);
    }

    #[tokio::test]
    async fn test_empty_range_yields_empty_series() {
        let pipeline = pipeline_over(vec![tick(10_000, 2580.0, 2579.0)]);
        let far_future = 9_000_000_000_000;
        let (prices, spreads) = pipeline.raw_series(far_future, far_future).await.unwrap();
        assert!(prices.is_empty());
        assert!(spreads.is_empty());
        assert_eq!(spreads.mode, ZScoreMode::default());
    }

    #[tokio::test]
    async fn test_correlation_uses_paired_rows_only() {
        let mut ticks: Vec<TickRecord> = (0..20)
            .map(|i| tick(10_000 + i * 60, 2580.0 + i as f64, 2579.0 + i as f64))
            .collect();
        // A one-sided row must not disturb the pairing
        ticks.push(TickRecord {
            cex: CexSnapshot {
                close: 0.0,
                ..ticks[0].cex
            },
            ..tick(12_000, 2600.0, 2599.0)
        });
        let pipeline = pipeline_over(ticks);

        let curve = pipeline
            .correlation(0, 20_000_000, 3)
            .await
            .unwrap();
        assert_eq!(curve.len(), 7);
        let lag0 = curve.iter().find(|c| c.lag == 0).unwrap();
        assert!((lag0.correlation - 1.0).abs() < 1e-6);
    }
}
