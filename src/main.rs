//! ArbScope - Paired CEX/DEX Price Analytics Engine
//!
//! One-shot analysis runs over columnar tick datasets: price and spread
//! series, fee-aware signal detection, candle aggregation, lagged
//! cross-correlation and a signal-replay backtest, written out as JSON
//! artifacts. A seeded synthetic generator covers demo and test runs.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbscope_engine::analytics::candles::{self, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE};
use arbscope_engine::analytics::ZScoreMode;
use arbscope_engine::backtest::BacktestConfig;
use arbscope_engine::config::{DetectorConfig, DetectorOverrides, EngineConfig};
use arbscope_engine::dispatch::Dispatcher;
use arbscope_engine::ingest::candle_file::CandleFile;
use arbscope_engine::ingest::csv::load_signals;
use arbscope_engine::ingest::source::DatasetCache;
use arbscope_engine::pipeline::AnalysisPipeline;
use arbscope_engine::signals::SignalDetector;
use arbscope_engine::synthetic::{SyntheticConfig, SyntheticGenerator};

/// Paired CEX/DEX price analytics over columnar tick datasets
#[derive(Parser, Debug)]
#[command(name = "arbscope", version)]
#[command(about = "Analyze paired CEX/DEX tick data for tradable spread dislocations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis pass and write JSON artifacts
    Analyze(AnalyzeArgs),

    /// Generate a seeded synthetic dataset for demos and tests
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Columnar dataset path (overrides ARBSCOPE_DATASET)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Output directory for JSON artifacts
    #[arg(short, long, default_value = "./artifacts")]
    out: PathBuf,

    /// Range start in epoch milliseconds (dataset start when omitted)
    #[arg(long)]
    start: Option<i64>,

    /// Range end in epoch milliseconds (dataset end when omitted)
    #[arg(long)]
    end: Option<i64>,

    /// Candle interval: 1m, 5m, 15m, 1h, 4h, 1d, or raw milliseconds
    #[arg(long, default_value = "1h")]
    interval: String,

    /// Maximum lag in steps for the cross-correlation sweep
    #[arg(long, default_value = "10")]
    max_lag: usize,

    /// CSV of previously recorded signals to import and recost
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Use log-compressed spreads instead of rolling z-scores
    #[arg(long)]
    log_zscore: bool,

    /// Run every stage inline instead of on the worker pool
    #[arg(long)]
    sync: bool,

    /// Minimum absolute spread in quote units
    #[arg(long)]
    price_threshold: Option<f64>,

    /// Minimum absolute z-score
    #[arg(long)]
    z_score_threshold: Option<f64>,

    /// Minimum combined venue volume per point
    #[arg(long)]
    volume_min: Option<f64>,

    /// Upper bound on simulated fill size
    #[arg(long)]
    size_cap: Option<f64>,

    /// CEX taker fee rate
    #[arg(long)]
    cex_fee: Option<f64>,

    /// DEX pool fee rate
    #[arg(long)]
    dex_fee: Option<f64>,

    /// Flat gas cost per trade in quote units
    #[arg(long)]
    gas_fee: Option<f64>,

    /// Slippage rate on the higher venue price
    #[arg(long)]
    slippage: Option<f64>,
}

#[derive(Args, Debug)]
struct SynthArgs {
    /// Output path for the columnar dataset
    #[arg(short, long, default_value = "./data/synthetic_data.json")]
    out: PathBuf,

    /// Number of paired observations
    #[arg(long, default_value = "2880")]
    points: usize,

    /// Seconds between observations
    #[arg(long, default_value = "60")]
    step_secs: i64,

    /// Walk seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Starting price for both venues
    #[arg(long, default_value = "2580.0")]
    base_price: f64,

    /// First timestamp in epoch seconds (stream ends near now when omitted)
    #[arg(long)]
    start_ts: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Synth(args) => run_synth(args),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arbscope_engine=info,arbscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = EngineConfig::from_env()?;
    let dataset_path = args
        .dataset
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.dataset_path));

    let detector_config = DetectorConfig::with_overrides(DetectorOverrides {
        price_threshold: args.price_threshold,
        z_score_threshold: args.z_score_threshold,
        volume_min: args.volume_min,
        size_cap: args.size_cap,
        cex_fee: args.cex_fee,
        dex_fee: args.dex_fee,
        gas_fee: args.gas_fee,
        slippage: args.slippage,
    })
    .context("Invalid detector configuration")?;

    let interval_ms = parse_interval(&args.interval)?;

    let dispatcher = if args.sync {
        info!("running synchronously, worker pool disabled");
        Dispatcher::inline()
    } else {
        Dispatcher::from_runtime_with(Duration::from_secs(config.task_timeout_secs))
    };

    let mode = if args.log_zscore {
        ZScoreMode::LogCompressed
    } else {
        ZScoreMode::RollingWindow {
            window: config.zscore_window,
        }
    };

    let source = Arc::new(DatasetCache::new(&dataset_path));
    let mut pipeline = AnalysisPipeline::new(source)
        .with_dispatcher(dispatcher)
        .with_zscore_mode(mode)
        .with_backtest_config(BacktestConfig {
            initial_capital: config.initial_capital,
        });

    if let Some(candle_path) = &config.candle_file_path {
        match CandleFile::load(Path::new(candle_path)) {
            Ok(file) => pipeline = pipeline.with_candle_file(file),
            Err(e) => warn!("Precomputed candle file unavailable, falling back to live aggregation: {}", e),
        }
    }

    let summary = pipeline
        .summary()
        .await
        .with_context(|| format!("Failed to load dataset: {:?}", dataset_path))?;

    let (data_start, data_end) = match (summary.start_ms, summary.end_ms) {
        (Some(start), Some(end)) => (start, end),
        _ => bail!("Dataset {:?} contains no usable rows", dataset_path),
    };
    let start_ms = args.start.unwrap_or(data_start);
    let end_ms = args.end.unwrap_or(data_end);
    if start_ms > end_ms {
        bail!("Range start {} is after range end {}", start_ms, end_ms);
    }

    info!(
        "analyzing {:?}: {} rows, range {}..{}",
        dataset_path, summary.total_rows, start_ms, end_ms
    );

    let (prices, spreads) = pipeline.raw_series(start_ms, end_ms).await?;
    let signals = pipeline
        .signals(start_ms, end_ms, detector_config.clone())
        .await?;
    let venue_candles = pipeline.candles(start_ms, end_ms, interval_ms).await?;
    let correlation = pipeline.correlation(start_ms, end_ms, args.max_lag).await?;
    let report = pipeline.backtest(&signals);

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory {:?}", args.out))?;

    write_artifact(&args.out, "summary.json", &summary)?;
    write_artifact(&args.out, "prices.json", &prices)?;
    write_artifact(&args.out, "spreads.json", &spreads)?;
    write_artifact(&args.out, "signals.json", &signals)?;
    let candle_export = candles::export(venue_candles, start_ms, end_ms, interval_ms);
    write_artifact(&args.out, "candles.json", &candle_export)?;
    write_artifact(&args.out, "correlation.json", &correlation)?;
    write_artifact(&args.out, "backtest.json", &report)?;

    let mut imported_count = None;
    if let Some(csv_path) = &args.csv {
        let import = load_signals(csv_path)
            .with_context(|| format!("Failed to import signals from {:?}", csv_path))?;
        let recosted = SignalDetector::new(detector_config).recost(&import.signals);
        let real_report = pipeline.backtest(&recosted);
        info!(
            "imported {} recorded signals, {} kept after recosting",
            import.signals.len(),
            recosted.len()
        );
        write_artifact(&args.out, "real_signals.json", &recosted)?;
        write_artifact(&args.out, "real_backtest.json", &real_report)?;
        imported_count = Some(recosted.len());
    }

    let stats = pipeline.dispatcher_stats();

    println!("{}", "=".repeat(70));
    println!("ANALYSIS SUMMARY");
    println!("{}", "=".repeat(70));
    println!("Range:              {} .. {}", start_ms, end_ms);
    println!(
        "Rows:               {} ({} skipped on decode)",
        summary.total_rows, summary.skipped_rows
    );
    println!(
        "Price points:       {} CEX / {} DEX",
        prices.cex.len(),
        prices.dex.len()
    );
    println!("Spread points:      {}", spreads.points.len());
    println!("Signals detected:   {}", signals.len());
    if let Some(count) = imported_count {
        println!("Signals imported:   {}", count);
    }
    println!(
        "Candles ({:>3}):      {} DEX / {} CEX",
        candle_export.meta.interval_label,
        candle_export.meta.dex_count,
        candle_export.meta.cex_count
    );
    if let Some(best) = correlation.iter().max_by(|a, b| {
        a.correlation
            .abs()
            .partial_cmp(&b.correlation.abs())
            .unwrap_or(Ordering::Equal)
    }) {
        println!(
            "Peak correlation:   {:.4} at lag {:+}",
            best.correlation, best.lag
        );
    }
    println!("{}", "-".repeat(70));
    println!("Net profit:         ${:.2}", report.total_net_profit);
    println!("Final equity:       ${:.2}", report.final_equity);
    if let Some(win_rate) = report.win_rate {
        println!("Win rate:           {:.1}%", win_rate * 100.0);
    }
    if let Some(sharpe) = report.sharpe_ratio {
        println!("Sharpe ratio:       {:.3}", sharpe);
    }
    println!("Max drawdown:       {:.4}%", report.max_drawdown * 100.0);
    println!("{}", "-".repeat(70));
    println!(
        "Dispatcher:         {} submitted, {} fallbacks",
        stats.submitted, stats.fallbacks
    );
    println!("Artifacts:          {:?}", args.out);
    println!("{}", "=".repeat(70));

    Ok(())
}

fn run_synth(args: SynthArgs) -> Result<()> {
    let start_ts = args
        .start_ts
        .unwrap_or_else(|| chrono::Utc::now().timestamp() - args.points as i64 * args.step_secs);

    let mut generator = SyntheticGenerator::new(SyntheticConfig {
        base_price: args.base_price,
        seed: args.seed,
        ..SyntheticConfig::default()
    });
    let file = generator.columnar_file(start_ts, args.points, args.step_secs);

    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(&args.out, json).with_context(|| format!("Failed to write {:?}", args.out))?;

    info!(
        "synthetic dataset written: {} rows starting at {}",
        args.points, start_ts
    );
    println!(
        "Synthetic dataset written to {:?} ({} rows, seed {})",
        args.out, args.points, args.seed
    );

    Ok(())
}

fn write_artifact<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

fn parse_interval(raw: &str) -> Result<i64> {
    let ms = match raw {
        "1m" => MS_PER_MINUTE,
        "5m" => 5 * MS_PER_MINUTE,
        "15m" => 15 * MS_PER_MINUTE,
        "1h" => MS_PER_HOUR,
        "4h" => 4 * MS_PER_HOUR,
        "1d" => MS_PER_DAY,
        other => other
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("Unrecognized interval: {}", other))?,
    };
    if ms <= 0 {
        bail!("Interval must be positive, got {}", raw);
    }
    Ok(ms)
}
