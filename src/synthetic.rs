//! Seeded synthetic tick generator for fixtures and demos: paired
//! random-walk prices with a periodic DEX impulse that opens a spread.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ingest::columnar::ColumnarFile;
use crate::models::{round_dp, CexSnapshot, DexSnapshot, TickRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub base_price: f64,
    /// Per-step walk amplitude as a fraction of the current price.
    pub volatility: f64,
    /// Every this many steps the DEX leg takes an extra price kick.
    pub impulse_every: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            base_price: 2580.0,
            volatility: 0.02,
            impulse_every: 300,
            seed: 42,
        }
    }
}

pub struct SyntheticGenerator {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Emit `points` paired observations starting at `start_ts`
    /// (epoch seconds), one every `step_secs`.
    ///
    /// Volumes are sized so the default detector volume floor is
    /// satisfiable.
    pub fn ticks(&mut self, start_ts: i64, points: usize, step_secs: i64) -> Vec<TickRecord> {
        let mut cex_price = self.config.base_price;
        let mut dex_price = self.config.base_price * (1.0 + self.rng.gen_range(-0.001..0.001));
        let mut prev_close = round_dp(cex_price, 2);

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            cex_price += (self.rng.gen::<f64>() - 0.5) * self.config.volatility * cex_price;
            dex_price += (self.rng.gen::<f64>() - 0.5) * self.config.volatility * dex_price;
            if self.config.impulse_every > 0 && i % self.config.impulse_every == 0 {
                dex_price += (self.rng.gen::<f64>() - 0.5) * 0.01 * dex_price;
            }
            // Keep the walk positive on long runs
            cex_price = cex_price.max(1.0);
            dex_price = dex_price.max(1.0);

            let close = round_dp(cex_price, 2);
            let avg_price = round_dp(dex_price, 2);
            let jitter = self.rng.gen_range(0.0..2.0);

            let cex_volume = self.rng.gen_range(4_000.0..12_000.0);
            let dex_volume = self.rng.gen_range(1_000.0..6_000.0);
            let swap_count = self.rng.gen_range(1.0_f64..30.0).round();

            out.push(TickRecord {
                timestamp: start_ts + i as i64 * step_secs,
                dex: DexSnapshot {
                    swap_count,
                    volume_base: round_dp(dex_volume, 2),
                    volume_quote: round_dp(dex_volume * avg_price, 2),
                    avg_price,
                    min_price: round_dp(avg_price - jitter, 2),
                    max_price: round_dp(avg_price + jitter, 2),
                    price_std: round_dp(jitter / 2.0, 4),
                },
                cex: CexSnapshot {
                    open: prev_close,
                    high: round_dp(prev_close.max(close) + jitter, 2),
                    low: round_dp(prev_close.min(close) - jitter, 2),
                    close,
                    volume: round_dp(cex_volume, 2),
                    quote_volume: round_dp(cex_volume * close, 2),
                    trades: self.rng.gen_range(1.0_f64..200.0).round(),
                },
                price_diff: Some(round_dp(close - avg_price, 4)),
            });
            prev_close = close;
        }
        out
    }

    /// Same stream packaged as a writable columnar dataset.
    pub fn columnar_file(&mut self, start_ts: i64, points: usize, step_secs: i64) -> ColumnarFile {
        ColumnarFile::from_ticks(&self.ticks(start_ts, points, step_secs))
    }
}
