//! Shelfwatch main entry point
//!
//! This is the command-line interface for the shelfwatch catalog crawler.

use clap::Parser;
use std::path::PathBuf;
use shelfwatch::config::load_config_with_hash;
use tracing_subscriber::EnvFilter;

/// Shelfwatch: a book catalog crawler with change detection
///
/// Shelfwatch crawls an online book catalog category by category, stores
/// every book with a content hash, and on later runs detects price,
/// availability, rating and review-count changes.
#[derive(Parser, Debug)]
#[command(name = "shelfwatch")]
#[command(version = "1.0.0")]
#[command(about = "A book catalog crawler with change detection", long_about = None)]
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

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Run a change-detection cycle over stored books instead of crawling
    #[arg(long, conflicts_with_all = ["report", "stats"])]
    detect: bool,

    /// Print a change report in the given format and exit
    #[arg(long, value_name = "FORMAT", conflicts_with_all = ["detect", "stats"])]
    report: Option<ReportArg>,

    /// Maximum number of changes to include in the report
    #[arg(long, value_name = "N")]
    limit: Option<u32>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["detect", "report"])]
    stats: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ReportArg {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.detect {
        handle_detect(&config).await?;
    } else if let Some(format) = cli.report {
        handle_report(&config, format, cli.limit)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
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
            0 => EnvFilter::new("shelfwatch=info,warn"),
            1 => EnvFilter::new("shelfwatch=debug,info"),
            2 => EnvFilter::new("shelfwatch=trace,debug"),
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

/// Handles the main crawl operation
async fn handle_crawl(config: shelfwatch::Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }

    match shelfwatch::run_crawl(config, !fresh).await {
        Ok(summary) => {
            println!("=== Crawl Summary ===");
            println!("  Pages fetched:      {}", summary.fetched);
            println!("  Books stored:       {}", summary.stored);
            println!("  Duplicates skipped: {}", summary.duplicates_skipped);
            println!("  Failed:             {}", summary.failed);
            println!("  Categories crawled: {}", summary.categories_crawled);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the --detect mode: one change-detection cycle
async fn handle_detect(config: &shelfwatch::Config) -> anyhow::Result<()> {
    tracing::info!("Starting change-detection cycle");

    match shelfwatch::run_change_detection(config).await {
        Ok(summary) => {
            println!("=== Change Detection Summary ===");
            println!("  Books checked:        {}", summary.checked);
            println!("  Unchanged:            {}", summary.unchanged);
            println!("  Skipped:              {}", summary.skipped);
            println!("  Price changes:        {}", summary.price_changes);
            println!("  Availability changes: {}", summary.availability_changes);
            println!("  Rating changes:       {}", summary.rating_changes);
            println!("  Review count changes: {}", summary.reviews_changes);
            println!("  Total changes:        {}", summary.total_changes);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Change detection failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the --report mode: prints recent changes as JSON or CSV
fn handle_report(
    config: &shelfwatch::Config,
    format: ReportArg,
    limit: Option<u32>,
) -> anyhow::Result<()> {
    use shelfwatch::output::{generate_change_report, ReportFormat};
    use std::path::Path;

    let storage = shelfwatch::SqliteStorage::new(Path::new(&config.output.database_path))?;
    let format = match format {
        ReportArg::Json => ReportFormat::Json,
        ReportArg::Csv => ReportFormat::Csv,
    };
    let limit = limit.unwrap_or(config.report.limit);

    let report = generate_change_report(&storage, format, limit)?;
    println!("{}", report);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &shelfwatch::Config) -> anyhow::Result<()> {
    use shelfwatch::output::{load_statistics, print_statistics};
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = shelfwatch::SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}
