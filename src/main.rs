//! Window-Harvest main entry point
//!
//! This is the command-line interface for the Window-Harvest search API harvester.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use window_harvest::config::{load_config_with_hash, Config};
use window_harvest::crawler::{export_only, harvest};
use window_harvest::output::{load_statistics, print_statistics};
use window_harvest::storage::open_storage;

/// Window-Harvest: an adaptive time-window harvester
///
/// Window-Harvest pulls every record from a paginated, windowed search API by
/// bisecting time windows the API cannot fully enumerate. Records land in an
/// idempotent SQLite checkpoint and are exported to CSV at the end of each run.
#[derive(Parser, Debug)]
#[command(name = "window-harvest")]
#[command(version)]
#[command(about = "An adaptive time-window harvester for paginated search APIs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_only"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_only"])]
    stats: bool,

    /// Export the existing database to CSV and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_only {
        handle_export_only(&config)?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("window_harvest=info,warn"),
            1 => EnvFilter::new("window_harvest=debug,info"),
            2 => EnvFilter::new("window_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the harvest plan
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let range = config.crawl.scan_range(Utc::now())?;
    let min_window = config.crawl.min_window()?;

    println!("=== Window-Harvest Dry Run ===\n");

    println!("API:");
    println!("  Endpoint: {}", config.api.base_url);
    println!("  Area: {}", config.api.area);
    println!("  Page size: {}", config.api.per_page);
    println!("  Order: {}", config.api.order_by);
    println!("  Timeout: {}s", config.api.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nCrawl:");
    println!("  Range: {}", range);
    println!("  Target: {} records", config.crawl.target);
    println!("  Minimum window: {} minutes", min_window.num_minutes());
    println!("  Pacing delay: {}ms", config.crawl.pacing_delay_ms);
    println!(
        "  Cooldowns: {}ms after 429, {}ms after 403",
        config.crawl.rate_limit_cooldown_ms, config.crawl.ban_cooldown_ms
    );
    println!("  Page retries: {}", config.crawl.max_page_retries);

    let detector = config.saturation.detector();
    println!("\nSaturation:");
    println!(
        "  Split when found >= {} or pages >= {}",
        detector.max_found(),
        detector.max_pages()
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export: {}", config.output.export_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-only mode: re-exports the existing database
fn handle_export_only(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Harvest ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.export_path);
    println!();

    let summary = export_only(config).context("Export failed")?;

    println!(
        "✓ Exported {} records ({} columns) to: {}",
        summary.rows,
        summary.columns,
        summary.path.display()
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<()> {
    tracing::info!(
        "Target: {} records, database: {}",
        config.crawl.target,
        config.output.database_path
    );

    let outcome = harvest(config, config_hash)
        .await
        .context("Harvest failed")?;

    if outcome.report.store_size < outcome.report.target {
        tracing::warn!(
            "Target not reached: {} of {} records ({})",
            outcome.report.store_size,
            outcome.report.target,
            outcome.report.stop_reason
        );
    }

    Ok(())
}
