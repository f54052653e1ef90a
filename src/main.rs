//! # Story Crawler
//!
//! Collects long-form text stories from Pikabu's search pages into a CSV file,
//! then cleans that file up in a separate pass.
//!
//! ## Features
//!
//! - Walks search results page by page across a date window
//! - Skips sponsored posts and stories shorter than 2000 characters
//! - Normalizes titles, tags and bodies (links and punctuation stripped)
//! - Appends every accepted story to `db.csv` as soon as it is seen
//! - `dedup` keeps one row per story and sorts by publication time
//!
//! ## Usage
//!
//! ```sh
//! story_crawler crawl --from 2017-01-01 --until 2022-05-28 --target 100000
//! story_crawler dedup --input db.csv --output cleaned_db.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Addressing**: Turn the `(page, date)` cursor into a search URL
//! 2. **Fetching**: One GET at a time, cooling down after failures
//! 3. **Extraction**: Filter ads, extract and normalize each story
//! 4. **Output**: Append rows to the store; dedup runs offline

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawler;
mod error;
mod fetcher;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::{Cli, Command, CrawlArgs, DedupArgs};
use config::CrawlConfig;
use crawler::{Crawler, watch_interrupts};
use fetcher::HttpPageSource;
use models::CrawlOutcome;
use outputs::dedup::dedup_store;
use outputs::store::AppendOnlyStore;
use utils::ensure_parent_dir;

/// Exit status after an operator interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_tracing(&args.log_file)?;
    debug!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Crawl(crawl_args) => run_crawl(crawl_args).await,
        Command::Dedup(dedup_args) => run_dedup(dedup_args),
    }
}

/// Console plus log-file output, both timestamped and leveled.
fn init_tracing(log_file: &Path) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tfmt::layer()
        .with_target(false)
        .with_timer(tfmt::time::UtcTime::rfc_3339());
    let logfile = tfmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(tfmt::time::UtcTime::rfc_3339())
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(logfile)
        .try_init()?;
    Ok(())
}

async fn run_crawl(args: CrawlArgs) -> Result<(), Box<dyn Error>> {
    let base = match &args.config {
        Some(path) => CrawlConfig::load(path)?,
        None => CrawlConfig::default(),
    };
    let config = args.apply(base);
    config.validate()?;
    info!(?config, "Crawler starting up");

    if let Err(e) = ensure_parent_dir(&config.store_path).await {
        error!(
            path = %config.store_path.display(),
            error = %e,
            "Store directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let source = HttpPageSource::new(config.request_timeout(), config.failure_cooldown())?;
    let store = AppendOnlyStore::open(&config.store_path)?;
    let mut crawler = Crawler::new(config, source, store)?;

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if watch_interrupts(stop, tokio::signal::ctrl_c).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let result = crawler.run().await;
    match result {
        Ok(summary) => {
            crawler.into_store().into_inner()?;
            summary.log();
            if summary.outcome == CrawlOutcome::Interrupted {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            Ok(())
        }
        Err(e) => {
            let counters = crawler.counters();
            error!(
                error = %e,
                added = counters.current_data_count,
                parsed = counters.all_story_count,
                errors = counters.number_of_errors,
                "Crawl aborted"
            );
            Err(e.into())
        }
    }
}

fn run_dedup(args: DedupArgs) -> Result<(), Box<dyn Error>> {
    dedup_store(&args.input, &args.output)?;
    Ok(())
}
