//! Command-line interface definitions for the story crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Crawl settings given as flags override the same keys from `--config`.

use crate::config::CrawlConfig;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the story crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl with the built-in defaults
/// story_crawler crawl
///
/// # Narrow the date window and stop after 500 stories
/// story_crawler crawl --from 2021-01-01 --until 2021-01-31 --target 500
///
/// # Clean up the accumulated store
/// story_crawler dedup --input db.csv --output cleaned_db.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// File that receives a copy of every log line (appended)
    #[arg(long, global = true, env = "STORY_CRAWLER_LOG", default_value = "parser.log")]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl search results into the append-only store
    Crawl(CrawlArgs),
    /// Remove duplicate stories from a store and sort it by publication time
    Dedup(DedupArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Optional path to a YAML crawl config
    #[arg(short, long, env = "STORY_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// First day of the date window (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day of the date window (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Number of stories to collect before stopping
    #[arg(short, long)]
    pub target: Option<u64>,

    /// Results page to start from
    #[arg(long)]
    pub start_page: Option<u32>,

    /// Append-only CSV store
    #[arg(short, long)]
    pub store: Option<PathBuf>,
}

impl CrawlArgs {
    /// Apply flags on top of a base config.
    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if let Some(from) = self.from {
            config.from_date = from;
        }
        if let Some(until) = self.until {
            config.until_date = until;
        }
        if let Some(target) = self.target {
            config.target_records = target;
        }
        if let Some(page) = self.start_page {
            config.start_page = page;
        }
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Store produced by `crawl`
    #[arg(short, long, default_value = "db.csv")]
    pub input: PathBuf,

    /// Where to write the cleaned copy
    #[arg(short, long, default_value = "cleaned_db.csv")]
    pub output: PathBuf,
}
