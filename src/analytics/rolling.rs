//! Rolling spread statistics and z-score strategies.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_ZSCORE_WINDOW: usize = 100;

/// Strategy for the z-score attached to each spread point.
///
/// The chosen mode travels with the produced series so consumers know
/// which scale they are looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ZScoreMode {
    /// Standardize each point against the trailing `window` spreads
    /// (population std). Points with fewer than `window` predecessors
    /// score 0.
    RollingWindow { window: usize },
    /// History-free compression: sign(s) * ln(|s| + 1).
    LogCompressed,
}

impl Default for ZScoreMode {
    fn default() -> Self {
        ZScoreMode::RollingWindow {
            window: DEFAULT_ZSCORE_WINDOW,
        }
    }
}

/// Fixed-width trailing window with O(1) mean/std updates.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl RollingStats {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f64
    }

    /// Population standard deviation over the current contents.
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.sum / n as f64;
        // running sums can drift a hair negative on constant input
        let variance = (self.sum_sq / n as f64 - mean * mean).max(0.0);
        variance.sqrt()
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        if self.values.len() > self.window {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
                self.sum_sq -= evicted * evicted;
            }
        }
    }
}

/// Score each spread left to right.
///
/// The window strategy standardizes a point against its predecessors
/// only; the point itself enters the window afterwards. A window with
/// zero std scores 0 rather than blowing up.
pub fn zscores(spreads: &[f64], mode: ZScoreMode) -> Vec<f64> {
    match mode {
        ZScoreMode::RollingWindow { window } => {
            let mut stats = RollingStats::new(window);
            spreads
                .iter()
                .map(|&spread| {
                    let z = if stats.is_full() {
                        let std = stats.std_dev();
                        if std > f64::EPSILON {
                            (spread - stats.mean()) / std
                        } else {
                            0.0
                        }
                    } else {
                        0.0
                    };
                    stats.push(spread);
                    z
                })
                .collect()
        }
        ZScoreMode::LogCompressed => spreads.iter().map(|&s| log_compressed(s)).collect(),
    }
}

/// sign(s) * ln(|s| + 1), with sign(0) treated as 0.
pub fn log_compressed(spread: f64) -> f64 {
    if spread.abs() > f64::EPSILON {
        spread.signum() * (spread.abs() + 1.0).ln()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_scores_zero() {
        let spreads = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let scores = zscores(&spreads, ZScoreMode::RollingWindow { window: 5 });
        assert!(scores.iter().all(|&z| z == 0.0));
    }

    #[test]
    fn test_window_zscore_matches_hand_computation() {
        // window [1, 2, 3]: mean 2, population var 2/3
        let spreads = vec![1.0, 2.0, 3.0, 10.0];
        let scores = zscores(&spreads, ZScoreMode::RollingWindow { window: 3 });

        assert_eq!(scores[0], 0.0);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[2], 0.0);

        let std = (2.0f64 / 3.0).sqrt();
        let expected = (10.0 - 2.0) / std;
        assert!((scores[3] - expected).abs() < 1e-9, "got {}", scores[3]);
    }

    #[test]
    fn test_window_excludes_current_point() {
        // The fourth point's window is [1, 1, 1] even though the point
        // itself is far away from it.
        let spreads = vec![1.0, 1.0, 1.0, 100.0, 1.0];
        let scores = zscores(&spreads, ZScoreMode::RollingWindow { window: 3 });
        // flat window, std 0
        assert_eq!(scores[3], 0.0);
        // window [1, 1, 100] for the fifth point
        let mean = 34.0;
        let var = ((1.0f64 - mean).powi(2) * 2.0 + (100.0f64 - mean).powi(2)) / 3.0;
        let expected = (1.0 - mean) / var.sqrt();
        assert!((scores[4] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_constant_spreads_score_zero() {
        let spreads = vec![5.0; 20];
        let scores = zscores(&spreads, ZScoreMode::RollingWindow { window: 4 });
        assert!(scores.iter().all(|&z| z == 0.0));
    }

    #[test]
    fn test_log_compressed() {
        assert_eq!(log_compressed(0.0), 0.0);
        let e = std::f64::consts::E;
        assert!((log_compressed(e - 1.0) - 1.0).abs() < 1e-12);
        assert!((log_compressed(-(e - 1.0)) + 1.0).abs() < 1e-12);
        // symmetric around zero
        assert_eq!(log_compressed(3.5), -log_compressed(-3.5));
    }

    #[test]
    fn test_rolling_stats_eviction() {
        let mut stats = RollingStats::new(2);
        stats.push(10.0);
        stats.push(20.0);
        stats.push(30.0);
        assert_eq!(stats.len(), 2);
        assert!((stats.mean() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_rerun_is_identical() {
        let spreads: Vec<f64> = (0..500).map(|i| ((i * 37) % 113) as f64 * 0.25).collect();
        let first = zscores(&spreads, ZScoreMode::default());
        let second = zscores(&spreads, ZScoreMode::default());
        assert_eq!(first, second);
    }
}
