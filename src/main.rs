//! Price Harvest main entry point
//!
//! This is the command-line interface for the Price Harvest catalog scraper.

use anyhow::Context;
use clap::Parser;
use price_harvest::config::{hash_content, load_config_with_hash, validate, Config};
use price_harvest::output::print_run_report;
use price_harvest::scraper::{run_pipeline, Mode};
use price_harvest::source::HttpTransport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Price Harvest: a resumable catalog scraper
///
/// Price Harvest discovers catalog categories, pages through their product
/// listings, collects detail, offers, reviews, price history and similar
/// products for every listed product, and consolidates everything into
/// JSON/CSV exports. Interrupted runs pick up where they left off.
#[derive(Parser, Debug)]
#[command(name = "price-harvest")]
#[command(version)]
#[command(about = "A resumable catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file; defaults apply when it does not exist
    #[arg(short, long, value_name = "FILE", default_value = "harvest.toml")]
    config: PathBuf,

    /// Which part of the pipeline to run
    #[arg(short, long, value_enum, default_value_t = Mode::Full)]
    mode: Mode,

    /// Only scrape these category ids (and their subcategories)
    #[arg(long, value_name = "ID", num_args = 1..)]
    categories: Vec<u64>,

    /// Request a visible browser session instead of a headless one
    #[arg(long)]
    headed: bool,

    /// Refetch the category index even if one is stored
    #[arg(long)]
    rediscover: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_or_default(&cli.config)?;
    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid configuration")?;

    tracing::info!(
        "Mode: {}, data directory: {}",
        cli.mode,
        config.output.data_dir
    );

    let transport =
        Arc::new(HttpTransport::new(&config.source).context("Failed to build HTTP client")?);

    let report = match run_pipeline(config, &config_hash, cli.mode, transport).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    print_run_report(&report);

    if !report.is_clean() {
        tracing::warn!(
            "{} entities failed; run again to retry them",
            report.failed.len()
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("price_harvest=info,warn"),
            1 => EnvFilter::new("price_harvest=debug,info"),
            2 => EnvFilter::new("price_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file, or defaults when the file does not exist
fn load_or_default(path: &Path) -> anyhow::Result<(Config, String)> {
    if !path.exists() {
        tracing::info!(
            "No configuration at {}, using defaults",
            path.display()
        );
        return Ok((Config::default(), hash_content("")));
    }

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok((config, hash))
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.categories.is_empty() {
        config.categories.ids = cli.categories.clone();
    }
    if cli.headed {
        config.source.headless = false;
    }
    if cli.rediscover {
        config.categories.rediscover = true;
    }
}
