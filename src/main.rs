//! News-Harvest main entry point
//!
//! This is the command-line interface for the News-Harvest sitemap harvester.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use news_harvest::config::{load_config_with_hash, Config};
use news_harvest::crawler::{run_harvest, CrawlMode, Harvester};
use news_harvest::output::{export_csv, format_run_summary, load_statistics, print_statistics};
use news_harvest::storage::{open_storage, ArticleFilter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// News-Harvest: an incremental news sitemap harvester
///
/// News-Harvest walks date-partitioned sitemaps of configured news sources,
/// skips articles it already archived, and stores new ones in SQLite.
#[derive(Parser, Debug)]
#[command(name = "news-harvest")]
#[command(version)]
#[command(about = "An incremental news sitemap harvester", long_about = None)]
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

    /// Override the configured harvest mode
    #[arg(long, value_enum)]
    mode: Option<CrawlMode>,

    /// Restrict the run to these source ids (repeatable)
    #[arg(long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Validate config and show the sitemaps that would be fetched
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export stored articles as CSV to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,

    /// Export only articles whose title, description or text contains TEXT
    #[arg(long, value_name = "TEXT", requires = "export")]
    search: Option<String>,

    /// Export only articles published on or after DATE (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "export")]
    from: Option<NaiveDate>,

    /// Export only articles published on or before DATE (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "export")]
    to: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    for id in &cli.sources {
        if config.source(id).is_none() {
            bail!("Unknown source '{}' (not in configuration)", id);
        }
    }

    let mode = cli.mode.unwrap_or(config.harvest.mode);

    if cli.dry_run {
        handle_dry_run(config, mode, &cli.sources)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export {
        handle_export(&config, &cli, path)?;
    } else {
        handle_harvest(config, mode, &cli.sources).await?;
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
            0 => EnvFilter::new("news_harvest=info,warn"),
            1 => EnvFilter::new("news_harvest=debug,info"),
            2 => EnvFilter::new("news_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and lists the planned sitemaps
fn handle_dry_run(config: Config, mode: CrawlMode, only: &[String]) -> anyhow::Result<()> {
    println!("=== News-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Mode: {:?}", mode);
    println!("  Start date: {}", config.harvest.start_date);
    match config.harvest.end_date {
        Some(end) => println!("  End date: {}", end),
        None => println!("  End date: today"),
    }
    println!("  Item count cap: {}", config.harvest.item_count_cap);
    println!("  Skip known urls: {}", config.harvest.skip_known_urls);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let harvester = Harvester::new(config)?;
    let mut total = 0;
    for source in &harvester.config().sources {
        if !only.is_empty() && !only.contains(&source.id) {
            continue;
        }
        let targets = harvester.plan_source(source, mode)?;
        println!(
            "\nSource {} ({}, extractor {}): {} sitemaps",
            source.id,
            source.cadence,
            source.extractor_key(),
            targets.len()
        );
        for target in &targets {
            println!("  * {}", target.url);
        }
        total += targets.len();
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would fetch {} sitemaps", total);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes matching articles as CSV
fn handle_export(config: &Config, cli: &Cli, path: &Path) -> anyhow::Result<()> {
    let mut filter = ArticleFilter::new().published_between(cli.from, cli.to);
    match cli.sources.as_slice() {
        [] => {}
        [source] => filter = filter.source(source.clone()),
        _ => bail!("--export accepts at most one --source"),
    }
    if let Some(text) = &cli.search {
        filter = filter.text(text.clone());
    }

    let store = open_storage(Path::new(&config.output.database_path))?;
    let rows = export_csv(&store, &filter, path)
        .with_context(|| format!("Failed to export to {}", path.display()))?;

    println!("✓ Exported {} articles to: {}", rows, path.display());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, mode: CrawlMode, only: &[String]) -> anyhow::Result<()> {
    tracing::info!(
        "Starting {:?} harvest of {} sources into {}",
        mode,
        if only.is_empty() {
            config.sources.len()
        } else {
            only.len()
        },
        config.output.database_path
    );

    let results = match run_harvest(config, mode, only).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    for (source_id, summary) in &results {
        println!("{}", format_run_summary(source_id, summary));
    }

    Ok(())
}
