//! Data models for extracted stories and crawl progress.
//!
//! This module defines the core data structures used throughout the application:
//! - [`StoryRecord`]: One extracted story, in the fixed column order of the store
//! - [`CrawlCursor`]: The `(page, date)` traversal position of the crawler
//! - [`CrawlCounters`]: Per-run progress counters
//! - [`CrawlOutcome`]: Why a crawl stopped

use chrono::{Days, NaiveDate};
use std::fmt;

/// Column names of the store, in write order.
pub const STORE_HEADER: [&str; 9] = [
    "story_id",
    "author_id",
    "text_len",
    "rating",
    "comments_count",
    "tags",
    "story_datetime",
    "title",
    "text",
];

/// A story that passed the ad filter and was extracted from a search page.
///
/// Text fields (`title`, `tags`, `text`) are already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRecord {
    /// Site-wide story identifier, used as the dedup key.
    pub story_id: String,
    /// Identifier of the story's author.
    pub author_id: String,
    /// Character count of the normalized body text.
    pub text_len: usize,
    /// Story rating as published by the site.
    pub rating: i64,
    /// Comment count; `None` when the site omits it.
    pub comments_count: Option<u32>,
    /// Tag labels in page order.
    pub tags: Vec<String>,
    /// Publication timestamp exactly as found in the markup.
    pub story_datetime: String,
    /// Normalized title.
    pub title: String,
    /// Normalized body text, empty when the story has no text block.
    pub text: String,
}

impl StoryRecord {
    /// Render the record as a store row, matching [`STORE_HEADER`].
    ///
    /// Tags are encoded as a JSON array in a single cell.
    pub fn to_row(&self) -> Result<[String; 9], serde_json::Error> {
        Ok([
            self.story_id.clone(),
            self.author_id.clone(),
            self.text_len.to_string(),
            self.rating.to_string(),
            self.comments_count.map(|c| c.to_string()).unwrap_or_default(),
            serde_json::to_string(&self.tags)?,
            self.story_datetime.clone(),
            self.title.clone(),
            self.text.clone(),
        ])
    }
}

/// Result of advancing a [`CrawlCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// Moved to the next day on the same page.
    NextDate,
    /// Date window wrapped; moved to the next page at `from_date`.
    NextPage,
    /// Page limit exceeded; there is nothing left to visit.
    Exhausted,
}

/// Traversal position of the crawler.
///
/// The date runs fastest: every day of the window is visited for page 1,
/// then every day again for page 2, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    pub page_num: u32,
    pub current_date: NaiveDate,
}

impl CrawlCursor {
    pub fn new(page_num: u32, current_date: NaiveDate) -> Self {
        Self {
            page_num,
            current_date,
        }
    }

    /// Move one step through the `(page, date)` space.
    ///
    /// After [`CursorStep::Exhausted`] the cursor sits at `max_page + 1`
    /// (saturating at `u32::MAX`) and must not be used for another fetch.
    pub fn advance(&mut self, from: NaiveDate, until: NaiveDate, max_page: u32) -> CursorStep {
        match self.current_date.checked_add_days(Days::new(1)) {
            Some(next) if next <= until => {
                self.current_date = next;
                CursorStep::NextDate
            }
            _ => {
                self.current_date = from;
                match self.page_num.checked_add(1) {
                    Some(next) if next <= max_page => {
                        self.page_num = next;
                        CursorStep::NextPage
                    }
                    next => {
                        self.page_num = next.unwrap_or(u32::MAX);
                        CursorStep::Exhausted
                    }
                }
            }
        }
    }
}

/// Progress counters for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    /// Records written to the store.
    pub current_data_count: u64,
    /// Non-ad stories extracted, whether or not they were long enough.
    pub all_story_count: u64,
    /// Stories that failed extraction.
    pub number_of_errors: u64,
}

/// Terminal state of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    TargetReached,
    SpaceExhausted,
    Interrupted,
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlOutcome::TargetReached => write!(f, "finished: target reached"),
            CrawlOutcome::SpaceExhausted => write!(f, "finished: search space exhausted"),
            CrawlOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}
