//! Signal replay: walks detected signals in time order and builds an
//! equity curve with summary performance metrics.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{round_dp, Signal};

/// Annualization factor for the Sharpe ratio. Per-signal returns are
/// treated as daily observations, which overstates the ratio when
/// signals cluster tighter than daily. Good enough for ranking runs
/// against each other.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
        }
    }
}

/// One step of the equity curve, stamped with the signal's time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    #[serde(rename = "t")]
    pub time_ms: i64,
    pub equity: f64,
}

/// Aggregate outcome of replaying a signal set.
///
/// The ratio metrics are `None` when no signals were replayed, which is
/// a different statement than a replayed set that happened to score 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub total_signals: usize,
    pub winning_trades: usize,
    pub total_gross_profit: f64,
    pub total_cost: f64,
    pub total_net_profit: f64,
    pub final_equity: f64,
    pub win_rate: Option<f64>,
    pub avg_net_profit: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub equity_curve: Vec<EquityPoint>,
}

/// Replay `signals` through the stored profit figures.
///
/// Each signal moves equity by its `net_profit`, in `time_ms` order
/// regardless of input order. No re-pricing happens here; use
/// `SignalDetector::recost` first to evaluate a different fee schedule.
pub fn evaluate(signals: &[Signal], config: &BacktestConfig) -> BacktestReport {
    if signals.is_empty() {
        return BacktestReport {
            total_signals: 0,
            winning_trades: 0,
            total_gross_profit: 0.0,
            total_cost: 0.0,
            total_net_profit: 0.0,
            final_equity: config.initial_capital,
            win_rate: None,
            avg_net_profit: None,
            sharpe_ratio: None,
            max_drawdown: 0.0,
            equity_curve: Vec::new(),
        };
    }

    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by_key(|s| s.time_ms);

    let mut equity = config.initial_capital;
    let mut total_gross = 0.0;
    let mut total_cost = 0.0;
    let mut total_net = 0.0;
    let mut wins = 0usize;
    let mut curve = Vec::with_capacity(ordered.len());
    // Unrounded equities drive the metrics; the curve points are rounded.
    let mut equities = Vec::with_capacity(ordered.len());

    for signal in &ordered {
        total_gross += signal.gross_profit;
        total_cost += signal.total_cost;
        total_net += signal.net_profit;
        if signal.net_profit > 0.0 {
            wins += 1;
        }
        equity += signal.net_profit;
        equities.push(equity);
        curve.push(EquityPoint {
            time_ms: signal.time_ms,
            equity: round_dp(equity, 2),
        });
    }

    let count = ordered.len();
    let returns = step_returns(&equities);
    let report = BacktestReport {
        total_signals: count,
        winning_trades: wins,
        total_gross_profit: round_dp(total_gross, 2),
        total_cost: round_dp(total_cost, 2),
        total_net_profit: round_dp(total_net, 2),
        final_equity: round_dp(equity, 2),
        win_rate: Some(round_dp(wins as f64 / count as f64, 6)),
        avg_net_profit: Some(round_dp(total_net / count as f64, 2)),
        sharpe_ratio: Some(round_dp(sharpe(&returns), 4)),
        max_drawdown: round_dp(max_drawdown(&equities), 6),
        equity_curve: curve,
    };

    info!(
        signals = count,
        final_equity = report.final_equity,
        "Backtest complete: net ${:.2}, win rate {:.1}%, max drawdown {:.2}%",
        report.total_net_profit,
        report.win_rate.unwrap_or(0.0) * 100.0,
        report.max_drawdown * 100.0
    );

    report
}

/// Fractional returns between consecutive curve points. The curve has
/// one point per signal, so n signals give n - 1 returns; a single
/// point gives none.
fn step_returns(equities: &[f64]) -> Vec<f64> {
    equities
        .windows(2)
        .filter(|pair| pair[0].abs() > f64::EPSILON)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

/// Annualized mean-over-std of the step returns. Population std; a
/// flat return series scores 0.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev > f64::EPSILON {
        mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Largest peak-to-trough loss as a fraction of the running peak. The
/// peak is tracked over the curve itself, so a curve that never dips
/// below its own first point reports 0.
fn max_drawdown(equities: &[f64]) -> f64 {
    let mut peak = match equities.first() {
        Some(&first) => first,
        None => return 0.0,
    };
    let mut worst = 0.0;
    for &equity in equities {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - equity) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use serde_json::json;

    fn sig(time_ms: i64, net: f64) -> Signal {
        let gross = net.max(0.0) + 100.0;
        Signal {
            id: format!("sig_{}", time_ms / 1000),
            time_ms,
            direction: Direction::CexToDex,
            spread: 1.0,
            spread_pct: 0.0004,
            z_score: 2.5,
            size: 1000.0,
            gross_profit: gross,
            total_cost: gross - net,
            net_profit: net,
            confidence: 0.5,
            cex_price: 2580.0,
            dex_price: 2579.0,
            params: json!({}),
        }
    }

    #[test]
    fn test_empty_signals_yield_none_metrics() {
        let report = evaluate(&[], &BacktestConfig::default());

        assert_eq!(report.total_signals, 0);
        assert_eq!(report.winning_trades, 0);
        assert_eq!(report.final_equity, 100_000.0);
        assert!(report.equity_curve.is_empty());
        // None, not Some(0.0): nothing was measured
        assert_eq!(report.win_rate, None);
        assert_eq!(report.avg_net_profit, None);
        assert_eq!(report.sharpe_ratio, None);
        assert_eq!(report.max_drawdown, 0.0);
    }

    #[test]
    fn test_known_sequence_curve_and_metrics() {
        let signals = vec![sig(1000, 100.0), sig(2000, -50.0), sig(3000, 200.0)];
        let report = evaluate(&signals, &BacktestConfig::default());

        let equities: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equities, vec![100_100.0, 100_050.0, 100_250.0]);
        assert_eq!(report.final_equity, 100_250.0);
        assert_eq!(report.total_net_profit, 250.0);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.win_rate, Some(0.666667));
        assert_eq!(report.avg_net_profit, Some(83.33));
        // Trough is 50 off the 100_100 peak
        assert_eq!(report.max_drawdown, 0.0005);
        assert!(report.sharpe_ratio.unwrap() > 0.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["winningTrades"], 2);
        assert_eq!(json["totalSignals"], 3);
    }

    #[test]
    fn test_signals_replayed_in_time_order() {
        let signals = vec![sig(3000, 200.0), sig(1000, 100.0), sig(2000, -50.0)];
        let report = evaluate(&signals, &BacktestConfig::default());

        let times: Vec<i64> = report.equity_curve.iter().map(|p| p.time_ms).collect();
        assert_eq!(times, vec![1000, 2000, 3000]);
        let equities: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equities, vec![100_100.0, 100_050.0, 100_250.0]);
    }

    #[test]
    fn test_final_equity_identity() {
        let signals: Vec<Signal> = (0..40)
            .map(|i| sig(1_000 * (i + 1), ((i * 37) % 90) as f64 - 30.0))
            .collect();
        let report = evaluate(&signals, &BacktestConfig::default());

        let expected = 100_000.0 + report.total_net_profit;
        assert!((report.final_equity - expected).abs() < 1e-6);
        assert_eq!(
            report.equity_curve.last().unwrap().equity,
            report.final_equity
        );
    }

    #[test]
    fn test_single_signal_sharpe_is_zero() {
        // A one-point curve has no between-point returns
        let report = evaluate(&[sig(1000, 100.0)], &BacktestConfig::default());
        assert_eq!(report.sharpe_ratio, Some(0.0));
        assert_eq!(report.win_rate, Some(1.0));
    }

    #[test]
    fn test_sharpe_from_between_point_returns_only() {
        // Two points give exactly one return, so there is no dispersion
        // to score whatever the distance from the starting capital.
        let signals = vec![sig(1000, 1000.0), sig(2000, 2000.0)];
        let report = evaluate(&signals, &BacktestConfig::default());
        assert_eq!(report.sharpe_ratio, Some(0.0));
    }

    #[test]
    fn test_drawdown_tracks_the_curve_peak() {
        let signals = vec![sig(1000, -100.0), sig(2000, -100.0)];
        let report = evaluate(&signals, &BacktestConfig::default());

        assert_eq!(report.win_rate, Some(0.0));
        assert_eq!(report.winning_trades, 0);
        // Peak is the first curve point at 99_900, trough 100 below it
        assert_eq!(report.max_drawdown, 0.001001);
        assert_eq!(report.final_equity, 99_800.0);
    }

    #[test]
    fn test_loss_then_recovery_reports_zero_drawdown() {
        // The curve rises from its own first point; the gap to the
        // starting capital is not a drawdown.
        let signals = vec![sig(1000, -10_000.0), sig(2000, 5_000.0)];
        let report = evaluate(&signals, &BacktestConfig::default());

        let equities: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equities, vec![90_000.0, 95_000.0]);
        assert_eq!(report.max_drawdown, 0.0);
    }

    #[test]
    fn test_custom_initial_capital() {
        let config = BacktestConfig {
            initial_capital: 1_000.0,
        };
        let report = evaluate(&[sig(1000, 50.0)], &config);
        assert_eq!(report.final_equity, 1_050.0);
        assert_eq!(report.equity_curve[0].equity, 1_050.0);
    }
}
