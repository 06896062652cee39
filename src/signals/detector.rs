//! Threshold-based opportunity detection over spread series.

use rayon::prelude::*;
use tracing::info;

use crate::config::DetectorConfig;
use crate::models::{round_dp, Direction, Signal, SpreadPoint};
use crate::signals::fees::CostModel;

/// Scales |z| into a [0, 1] confidence. A 5-sigma move maps to 1.0.
const CONFIDENCE_Z_CEILING: f64 = 5.0;

/// Evaluates spread points against configured thresholds and emits
/// fee-aware signals for the ones that clear costs.
pub struct SignalDetector {
    config: DetectorConfig,
    costs: CostModel,
    /// Config snapshot embedded in every emitted signal.
    params_snapshot: serde_json::Value,
}

impl SignalDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let params_snapshot = serde_json::to_value(&config).unwrap_or(serde_json::Value::Null);
        let costs = CostModel::new(config.fees);
        Self {
            config,
            costs,
            params_snapshot,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Scan a spread series in order, collecting qualifying signals.
    pub fn detect(&self, points: &[SpreadPoint]) -> Vec<Signal> {
        let signals: Vec<Signal> = points.iter().filter_map(|p| self.evaluate(p)).collect();
        info!(
            points = points.len(),
            signals = signals.len(),
            "Signal detection complete"
        );
        signals
    }

    /// Same scan fanned out across the rayon pool. Output order matches
    /// `detect` because the indexed collect preserves input order.
    pub fn detect_parallel(&self, points: &[SpreadPoint]) -> Vec<Signal> {
        let signals: Vec<Signal> = points.par_iter().filter_map(|p| self.evaluate(p)).collect();
        info!(
            points = points.len(),
            signals = signals.len(),
            "Parallel signal detection complete"
        );
        signals
    }

    /// Gate one point: volume floor, then spread and z thresholds, then
    /// net profit after costs. Rejections return `None`.
    pub fn evaluate(&self, point: &SpreadPoint) -> Option<Signal> {
        if point.volume < self.config.volume_min {
            return None;
        }
        if point.spread.abs() < self.config.price_threshold
            || point.z_score.abs() < self.config.z_score_threshold
        {
            return None;
        }

        let size = point.volume.min(self.config.size_cap);
        let (gross, total, net) =
            self.costs
                .net_profit(point.spread, size, point.cex_price, point.dex_price);

        // Gate on the rounded figure so a stored net_profit is never 0.00
        // on an emitted signal.
        let net = round_dp(net, 2);
        if net <= 0.0 {
            return None;
        }

        Some(Signal {
            id: format!("sig_{}", point.time_ms / 1000),
            time_ms: point.time_ms,
            direction: Direction::from_spread(point.spread),
            spread: point.spread,
            spread_pct: point.spread_pct,
            z_score: point.z_score,
            size,
            gross_profit: round_dp(gross, 2),
            total_cost: round_dp(total, 2),
            net_profit: net,
            confidence: (point.z_score.abs() / CONFIDENCE_Z_CEILING).min(1.0),
            cex_price: point.cex_price,
            dex_price: point.dex_price,
            params: self.params_snapshot.clone(),
        })
    }

    /// Re-price existing signals under this detector's fee schedule.
    ///
    /// Threshold gates still apply, but the profitability gate does not:
    /// a re-priced signal that nets negative stays in the output so a
    /// backtest sees the loss. Identity fields (`id`, `direction`,
    /// `params`) are untouched.
    pub fn recost(&self, signals: &[Signal]) -> Vec<Signal> {
        signals
            .iter()
            .filter(|s| {
                s.spread.abs() >= self.config.price_threshold
                    && s.z_score.abs() >= self.config.z_score_threshold
            })
            .map(|s| {
                let size = s.size.min(self.config.size_cap);
                let (gross, total, net) =
                    self.costs
                        .net_profit(s.spread, size, s.cex_price, s.dex_price);
                Signal {
                    size,
                    gross_profit: round_dp(gross, 2),
                    total_cost: round_dp(total, 2),
                    net_profit: round_dp(net, 2),
                    confidence: (s.z_score.abs() / CONFIDENCE_Z_CEILING).min(1.0),
                    ..s.clone()
                }
            })
            .collect()
    }
}
