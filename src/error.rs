//! Error types for extraction, persistence, configuration, and the crawl loop.
//!
//! Only [`StoreError`] is fatal to a crawl. Network failures never surface as
//! errors at all (the fetcher turns them into an empty page), and
//! [`ExtractError`] is handled per story by the crawler.

use thiserror::Error;

/// Why a single story node could not be turned into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("story node is missing attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("story node has no element matching `{0}`")]
    MissingElement(&'static str),

    #[error("attribute `{attr}` is not a valid integer: {value:?}")]
    InvalidNumber { attr: &'static str, value: String },
}

/// Failure to read or write the CSV store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store has no `{0}` column")]
    MissingColumn(&'static str),

    #[error("could not serialize tags: {0}")]
    Tags(#[from] serde_json::Error),

    #[error("dedup output {0:?} is the input store; choose a new file")]
    OutputIsInput(std::path::PathBuf),
}

/// Invalid or unreadable crawl configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Io Error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML Error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that abort a crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}
