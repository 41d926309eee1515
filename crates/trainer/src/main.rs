//! Propensity trainer CLI
//!
//! Trains and evaluates one purchase-propensity classifier per channel and/or
//! city tier, then writes charts and JSON summaries to the results directory.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use propensity_trainer::settings::LogFormat;
use propensity_trainer::{load_normalized, run_segmentation, AppConfig, ReportPolicy, SegmentationSpec};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dimension {
    Channel,
    Region,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "propensity-train")]
#[command(author = "Propensity Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-segment purchase-propensity training and feature ranking", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV dataset, overrides `input`
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for charts and summaries, overrides `results_dir`
    #[arg(short, long)]
    results_dir: Option<PathBuf>,

    /// Segmentation to run
    #[arg(short, long, value_enum, default_value = "channel")]
    dimension: Dimension,

    /// Which segments get a chart, overrides `report.policy`
    #[arg(long, value_enum)]
    report: Option<ReportPolicy>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&args, &mut config);

    init_logging(&config, args.verbose)?;

    info!("Propensity trainer v{}", propensity_trainer::VERSION);

    let table = load_normalized(&config.input, &config.schema)
        .with_context(|| format!("Failed to load dataset {}", config.input.display()))?;

    let specs = match args.dimension {
        Dimension::Channel => vec![SegmentationSpec::channel()],
        Dimension::Region => vec![SegmentationSpec::region()],
        Dimension::Both => vec![SegmentationSpec::channel(), SegmentationSpec::region()],
    };

    for spec in specs {
        let display = spec.display.clone();
        run_segmentation(&table, spec, &config)
            .with_context(|| format!("{display} pipeline failed"))?;
    }

    Ok(())
}

fn apply_overrides(args: &Args, config: &mut AppConfig) {
    if let Some(input) = &args.input {
        config.input = input.clone();
    }
    if let Some(results_dir) = &args.results_dir {
        config.results_dir = results_dir.clone();
    }
    if let Some(policy) = args.report {
        config.report.policy = policy;
    }
    if args.verbose {
        config.log_level = "debug".to_string();
    }
}

fn init_logging(config: &AppConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(&config.log_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    match config.log_format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false).compact())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to set tracing subscriber")
}
