//! Lagged cross-correlation between the two venue price series.

use serde::{Deserialize, Serialize};

/// Pearson correlation at one integer lag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub lag: i64,
    pub correlation: f64,
}

/// Pearson correlation for every integer lag in `[-max_lag, max_lag]`,
/// ascending. A lag of `k` pairs `a[t + k]` with `b[t]`, so a peak at a
/// negative lag means `a` moves first.
pub fn lagged_correlation(a: &[f64], b: &[f64], max_lag: usize) -> Vec<LagCorrelation> {
    let max_lag = max_lag as i64;
    (-max_lag..=max_lag)
        .map(|lag| LagCorrelation {
            lag,
            correlation: correlation_at_lag(a, b, lag),
        })
        .collect()
}

/// Pearson on the overlap after shifting.
///
/// Overlap length is `min(|a|, |b|) - |lag|`; an empty overlap or a flat
/// series correlates at 0.
pub fn correlation_at_lag(a: &[f64], b: &[f64], lag: i64) -> f64 {
    let n = a.len().min(b.len()) as i64 - lag.abs();
    if n <= 0 {
        return 0.0;
    }

    let (start_a, start_b) = if lag >= 0 {
        (lag as usize, 0usize)
    } else {
        (0usize, (-lag) as usize)
    };

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_ab = 0.0;
    let mut sum_a_sq = 0.0;
    let mut sum_b_sq = 0.0;

    for i in 0..n as usize {
        let x = a[start_a + i];
        let y = b[start_b + i];
        sum_a += x;
        sum_b += y;
        sum_ab += x * y;
        sum_a_sq += x * x;
        sum_b_sq += y * y;
    }

    let n_f = n as f64;
    let numerator = sum_ab - sum_a * sum_b / n_f;
    let var_a = (sum_a_sq - sum_a * sum_a / n_f).max(0.0);
    let var_b = (sum_b_sq - sum_b * sum_b / n_f).max(0.0);
    let denominator = (var_a * var_b).sqrt();

    if denominator > f64::EPSILON {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(len: usize) -> Vec<f64> {
        (0..len).map(|i| (i as f64 * 0.37).sin() * 10.0 + 100.0).collect()
    }

    #[test]
    fn test_self_correlation_at_zero_lag() {
        let series = wave(200);
        let corr = correlation_at_lag(&series, &series, 0);
        assert!((corr - 1.0).abs() < 1e-9, "got {}", corr);
    }

    #[test]
    fn test_covers_full_lag_range_ascending() {
        let a = wave(50);
        let b = wave(50);
        let out = lagged_correlation(&a, &b, 5);
        assert_eq!(out.len(), 11);
        let lags: Vec<i64> = out.iter().map(|c| c.lag).collect();
        assert_eq!(lags, (-5..=5).collect::<Vec<i64>>());
    }

    #[test]
    fn test_shifted_copy_peaks_at_shift() {
        let base = wave(300);
        // b trails a by 3 steps: b[i] = a[i - 3]
        let b: Vec<f64> = std::iter::repeat(base[0])
            .take(3)
            .chain(base.iter().copied())
            .take(300)
            .collect();

        let out = lagged_correlation(&base, &b, 6);
        let best = out
            .iter()
            .max_by(|x, y| x.correlation.total_cmp(&y.correlation))
            .unwrap();
        assert_eq!(best.lag, -3, "peak at {:?}", best);
        assert!(best.correlation > 0.999);
    }

    #[test]
    fn test_flat_series_scores_zero() {
        let flat = vec![7.0; 40];
        let moving = wave(40);
        assert_eq!(correlation_at_lag(&flat, &moving, 0), 0.0);
        assert_eq!(correlation_at_lag(&moving, &flat, 2), 0.0);
    }

    #[test]
    fn test_empty_overlap_scores_zero() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(correlation_at_lag(&a, &b, 3), 0.0);
        assert_eq!(correlation_at_lag(&a, &b, -7), 0.0);
        assert_eq!(correlation_at_lag(&[], &b, 0), 0.0);
    }

    #[test]
    fn test_anticorrelated_series() {
        let a = wave(100);
        let b: Vec<f64> = a.iter().map(|v| 200.0 - v).collect();
        let corr = correlation_at_lag(&a, &b, 0);
        assert!((corr + 1.0).abs() < 1e-9, "got {}", corr);
    }
}
