//! Dataset Inspection Tool
//!
//! CLI tool to verify that a columnar paired-tick dataset is readable and
//! internally consistent before pointing the analysis pipeline at it.
//!
//! Usage:
//!   cargo run --release --bin dataset_inspect -- --path ./processed_data.json summary
//!   cargo run --release --bin dataset_inspect -- --path ./processed_data.json sample --count 5
//!   cargo run --release --bin dataset_inspect -- --path ./processed_data.json verify

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use arbscope_engine::ingest::columnar::{
    count_ordering_violations, load_dataset, summarize, NormalizedDataset,
};

/// Dataset Inspection Tool for paired CEX/DEX tick data
#[derive(Parser, Debug)]
#[command(name = "dataset_inspect")]
#[command(about = "Verify and inspect columnar tick datasets")]
struct Cli {
    /// Path to the columnar JSON dataset
    #[arg(short, long)]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show headline statistics for the dataset
    Summary {
        /// Write the summary as a JSON artifact instead of text
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the first rows of the decoded stream
    Sample {
        /// Number of rows to print
        #[arg(short, long, default_value = "5")]
        count: usize,
    },

    /// Verify integrity (ordering, skip counts, venue coverage)
    Verify,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dataset = load_dataset(&cli.path)
        .with_context(|| format!("Failed to load dataset: {:?}", cli.path))?;

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║              PAIRED TICK DATASET INSPECTION TOOL               ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Dataset: {:?}", cli.path);
    println!();

    match cli.command {
        Commands::Summary { output } => show_summary(&dataset, output)?,
        Commands::Sample { count } => show_samples(&dataset, count),
        Commands::Verify => verify_integrity(&dataset),
    }

    Ok(())
}

fn show_summary(dataset: &NormalizedDataset, output: Option<PathBuf>) -> Result<()> {
    let summary = summarize(dataset);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, &json).with_context(|| format!("Failed to write {:?}", path))?;
        println!("Summary artifact written to: {:?}", path);
        return Ok(());
    }

    println!("=== Dataset Summary ===\n");
    println!("  Total rows:        {}", summary.total_rows);
    println!("  Skipped rows:      {}", summary.skipped_rows);
    println!(
        "  First observation: {}",
        summary.start_ms.map(ms_to_datetime).unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Last observation:  {}",
        summary.end_ms.map(ms_to_datetime).unwrap_or_else(|| "-".to_string())
    );
    if let (Some(start), Some(end)) = (summary.start_ms, summary.end_ms) {
        let duration_min = (end - start) as f64 / 60_000.0;
        println!("  Duration:          {:.1} min", duration_min);
    }
    println!();
    println!("  DEX-active rows:   {}", summary.dex_active_rows);
    println!("  CEX-active rows:   {}", summary.cex_active_rows);
    println!("  Avg swap count:    {:.4}", summary.avg_swap_count);
    println!("  Avg price diff:    {:.4}", summary.avg_price_diff);

    Ok(())
}

fn show_samples(dataset: &NormalizedDataset, count: usize) {
    println!("=== Sample Data (first {} rows) ===\n", count);
    println!(
        "  {:>24} {:>12} {:>12} {:>10} {:>12}",
        "Time", "DEX Avg", "CEX Close", "Spread", "Volume"
    );
    println!("  {}", "-".repeat(76));

    let mut found = false;
    for tick in dataset.ticks.iter().take(count) {
        found = true;
        let spread = if tick.cex.close > 0.0 && tick.dex.avg_price > 0.0 {
            format!("{:>10.2}", tick.cex.close - tick.dex.avg_price)
        } else {
            format!("{:>10}", "-")
        };
        println!(
            "  {:>24} {:>12.2} {:>12.2} {} {:>12.2}",
            ms_to_datetime(tick.time_ms()),
            tick.dex.avg_price,
            tick.cex.close,
            spread,
            tick.cex.volume + tick.dex.volume_base
        );
    }

    if !found {
        println!("  (no data)");
    }
    println!();
}

fn verify_integrity(dataset: &NormalizedDataset) {
    println!("=== Data Integrity Verification ===\n");

    let violations = count_ordering_violations(&dataset.ticks);
    if violations > 0 {
        println!("  ⚠️  Timestamp ordering violations: {}", violations);
    } else {
        println!("  ✓  Timestamps are monotone non-decreasing");
    }

    if dataset.stats.rows_skipped > 0 {
        println!(
            "  ⚠️  Malformed rows skipped during decode: {}",
            dataset.stats.rows_skipped
        );
    } else {
        println!("  ✓  All rows decoded cleanly");
    }

    let dead_rows = dataset
        .ticks
        .iter()
        .filter(|t| t.dex.avg_price <= 0.0 && t.cex.close <= 0.0)
        .count();
    if dead_rows > 0 {
        println!("  ⚠️  Rows with no usable venue price: {}", dead_rows);
    } else {
        println!("  ✓  Every row has at least one usable venue price");
    }

    let paired = dataset
        .ticks
        .iter()
        .filter(|t| t.dex.avg_price > 0.0 && t.cex.close > 0.0)
        .count();
    if dataset.ticks.is_empty() {
        println!("  ⚠️  Dataset is empty");
    } else {
        let pct = paired as f64 / dataset.ticks.len() as f64 * 100.0;
        println!(
            "  ✓  Spread coverage: {}/{} rows paired ({:.1}%)",
            paired,
            dataset.ticks.len(),
            pct
        );
    }

    match dataset.time_bounds() {
        Some((start, end)) if start <= end => {
            println!(
                "  ✓  Time bounds sane: {} .. {}",
                ms_to_datetime(start),
                ms_to_datetime(end)
            );
        }
        Some(_) => println!("  ⚠️  Time bounds inverted"),
        None => {}
    }
}

fn ms_to_datetime(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt: DateTime<Utc>| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| format!("{}ms", ms))
}
