//! Crawl configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults ([`CrawlConfig::default`])
//! 2. An optional YAML file passed with `--config`
//! 3. Individual CLI flags
//!
//! # Example `config.yaml`
//!
//! ```yaml
//! from_date: 2019-01-01
//! until_date: 2019-12-31
//! target_records: 5000
//! store_path: data/db.csv
//! ```
//!
//! Keys that are left out keep their defaults.

use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Upper bound accepted for `max_page`.
pub const MAX_PAGE_LIMIT: u32 = 10_000;

/// Everything the crawler needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// First day of the date window (inclusive).
    pub from_date: NaiveDate,
    /// Last day of the date window (inclusive).
    pub until_date: NaiveDate,
    /// Stop once this many records have been written.
    pub target_records: u64,
    /// Results page the crawl starts on.
    pub start_page: u32,
    /// Last results page the site serves.
    pub max_page: u32,
    /// Minimum normalized body length, in characters, for a story to be kept.
    pub min_text_len: usize,
    /// Site root the search path is appended to.
    pub base_url: String,
    /// Append-only CSV store.
    pub store_path: PathBuf,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Sleep after a failed request.
    pub failure_cooldown_secs: u64,
    /// Base delay between date steps; a random extra of up to the same amount is added.
    pub step_delay_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            from_date: NaiveDate::from_ymd_opt(2017, 1, 1).expect("valid default date"),
            until_date: NaiveDate::from_ymd_opt(2022, 5, 28).expect("valid default date"),
            target_records: 100_000,
            start_page: 1,
            max_page: 100,
            min_text_len: 2000,
            base_url: "https://pikabu.ru".to_string(),
            store_path: PathBuf::from("db.csv"),
            request_timeout_secs: 6,
            failure_cooldown_secs: 60,
            step_delay_ms: 100,
        }
    }
}

impl CrawlConfig {
    /// Load a config file, filling omitted keys from the defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: CrawlConfig = serde_yaml::from_str(&raw)?;
        info!("Loaded crawl configuration");
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.from_date > self.until_date {
            return Err(ConfigError::Invalid(format!(
                "from_date {} is after until_date {}",
                self.from_date, self.until_date
            )));
        }
        if self.max_page > MAX_PAGE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_page {} exceeds the limit of {MAX_PAGE_LIMIT}",
                self.max_page
            )));
        }
        if self.start_page == 0 || self.start_page > self.max_page {
            return Err(ConfigError::Invalid(format!(
                "start_page {} must be between 1 and max_page {}",
                self.start_page, self.max_page
            )));
        }
        if self.target_records == 0 {
            return Err(ConfigError::Invalid(
                "target_records must be greater than zero".to_string(),
            ));
        }
        Url::parse(&self.base_url)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_page, 100);
        assert_eq!(config.min_text_len, 2000);
        assert_eq!(config.request_timeout(), Duration::from_secs(6));
        assert_eq!(config.failure_cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "from_date: 2019-01-01\nuntil_date: 2019-12-31\ntarget_records: 5000\n";
        let config: CrawlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.from_date, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
        assert_eq!(config.target_records, 5000);
        assert_eq!(config.start_page, 1);
        assert_eq!(config.store_path, PathBuf::from("db.csv"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "start_page: 7\nstep_delay_ms: 0\n").unwrap();
        let config = CrawlConfig::load(&path).unwrap();
        assert_eq!(config.start_page, 7);
        assert_eq!(config.step_delay(), Duration::ZERO);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let config = CrawlConfig {
            from_date: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            until_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            ..CrawlConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_start_page_out_of_range_is_rejected() {
        let zero = CrawlConfig {
            start_page: 0,
            ..CrawlConfig::default()
        };
        assert!(zero.validate().is_err());

        let past_end = CrawlConfig {
            start_page: 101,
            ..CrawlConfig::default()
        };
        assert!(past_end.validate().is_err());
    }

    #[test]
    fn test_huge_max_page_is_rejected() {
        let config = CrawlConfig {
            max_page: u32::MAX,
            ..CrawlConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let at_limit = CrawlConfig {
            max_page: MAX_PAGE_LIMIT,
            ..CrawlConfig::default()
        };
        at_limit.validate().unwrap();
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        let config = CrawlConfig {
            base_url: "pikabu".to_string(),
            ..CrawlConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Url(_))));
    }
}
