//! Stepcrawl main entry point
//!
//! This is the command-line interface for running a single crawl engine.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stepcrawl::config::{load_config_with_hash, validate, Config};
use stepcrawl::crawler::{CrawlEngine, HttpFetcher, TitleExtractor};
use stepcrawl::{Publisher, ShutdownSignal};
use tracing_subscriber::EnvFilter;

/// Stepcrawl: a fault-tolerant crawl worker
///
/// Stepcrawl walks a numeric ID range (or a list of URLs), extracts a record
/// from every page and republishes it to a message queue. Failed pages are
/// retried through tiered skip queues.
#[derive(Parser, Debug)]
#[command(name = "stepcrawl")]
#[command(version)]
#[command(about = "A fault-tolerant crawl worker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Extra URLs to crawl, appended to the configured list
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured starting ID
    #[arg(long, value_name = "ID", allow_negative_numbers = true)]
    start_id: Option<i64>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli).context("invalid command-line override")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("stepcrawl=info,warn"),
            1 => EnvFilter::new("stepcrawl=debug,info"),
            2 => EnvFilter::new("stepcrawl=trace,debug"),
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

/// Merges command-line URLs and the starting ID into the loaded config
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(start_id) = cli.start_id {
        config.crawler.starting_id = start_id;
    }
    if !cli.urls.is_empty() {
        config.crawler.urls.extend(cli.urls.iter().cloned());
    }
    validate(config)?;
    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Stepcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    if let Some(name) = &crawler.name {
        println!("  Name: {}", name);
    }
    if crawler.urls.is_empty() {
        println!("  Starting ID: {}", crawler.starting_id);
        println!("  Direction: {:+}", crawler.direction);
        match crawler.ending_id {
            Some(end) => println!("  Ending ID: {} (exclusive)", end),
            None => println!("  Ending ID: none"),
        }
        if let Some(template) = &crawler.url_template {
            println!("  URL template: {}", template);
        }
    } else {
        println!("  Explicit URLs ({}):", crawler.urls.len());
        for url in &crawler.urls {
            println!("    * {}", url);
        }
    }
    println!("  Skip tiers: {}", crawler.skip_tiers);
    println!(
        "  Backoff: threshold {} (+{}), idle {:?} up to {:?}",
        crawler.backoff_threshold,
        crawler.backoff_step,
        crawler.idle_time(),
        crawler.max_idle_time()
    );
    println!("  Check interval: {:?}", crawler.check_interval());
    println!("  Fetch timeout: {:?}", crawler.fetch_timeout());
    println!("  Calm: {}", crawler.is_calm());

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);

    println!("\nOutput:");
    match &config.broker {
        Some(broker) => {
            let (exchange, routing_key) = broker.route();
            println!("  Broker: {}:{} (vhost {})", broker.host, broker.port, broker.vhost);
            println!("  Exchange: '{}', routing key: '{}'", exchange, routing_key);
        }
        None => println!("  Local log"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing the current attempt");
                shutdown.set();
            }
        });
    }

    let publisher = Publisher::from_config(config.broker.as_ref()).await;
    let fetcher = HttpFetcher::from_config(
        &config.http,
        config.crawler.fetch_timeout(),
        config.crawler.offline_statuses.clone(),
    )
    .context("failed to build HTTP client")?;

    let mut engine = CrawlEngine::new(
        config.crawler,
        Box::new(fetcher),
        Box::new(TitleExtractor::default()),
        publisher,
    )
    .with_shutdown(shutdown);

    let report = engine.run().await;
    tracing::info!(
        "Crawler {} stopped ({}) at id {}: {} published, {} lost, {} skipped, {} requeued, took {}s",
        report.crawler,
        report.stop_reason,
        report.final_id,
        report.published,
        report.lost,
        report.skipped_left,
        report.requeued_left,
        (report.finished_at - report.started_at).num_seconds()
    );

    if report.stop_reason.is_fatal() {
        anyhow::bail!("crawler {} stopped: {}", report.crawler, report.stop_reason);
    }
    Ok(())
}
