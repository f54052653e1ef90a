//! Pikabu search-results scraper.
//!
//! Pikabu's `/search` endpoint does not take a calendar date. It takes a day
//! number `d` counted from an internal epoch, so the crawler converts each
//! cursor date with [`day_param`] before building the URL.
//!
//! # URL Pattern
//!
//! ```text
//! https://pikabu.ru/search?n=2&st=3&d=5245&page=1
//! ```
//!
//! `n=2` selects text posts and `st=3` sorts by relevance.
//!
//! # Story Markup
//!
//! Each result is an `<article class="story">` whose `data-*` attributes carry
//! the ids, rating and comment count. Sponsored posts are mixed into the same
//! list and are recognized by missing metadata (see [`is_advertisement`]).

use crate::error::ExtractError;
use crate::models::{CrawlCursor, StoryRecord};
use crate::utils::normalize;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use url::Url;

/// Day number Pikabu uses for [`REFERENCE_DATE`] (`d=5245` is 2022-05-11).
pub const REFERENCE_DAY_PARAM: i64 = 5245;

/// Author name used by Pikabu's own promotional account.
pub const SPONSOR_AUTHOR: &str = "pikabu.deals";

const STORY_SEL: &str = "article.story";
const DATETIME_SEL: &str = "time.caption.story__datetime.hint";
const TITLE_SEL: &str = "a.story__title-link";
const TAG_SEL: &str = "a.tags__tag";
const TEXT_BLOCK_SEL: &str = "div.story-block.story-block_type_text";

static STORY: Lazy<Selector> = Lazy::new(|| selector(STORY_SEL));
static DATETIME: Lazy<Selector> = Lazy::new(|| selector(DATETIME_SEL));
static TITLE: Lazy<Selector> = Lazy::new(|| selector(TITLE_SEL));
static TAG: Lazy<Selector> = Lazy::new(|| selector(TAG_SEL));
static TEXT_BLOCK: Lazy<Selector> = Lazy::new(|| selector(TEXT_BLOCK_SEL));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// The calendar date matching [`REFERENCE_DAY_PARAM`].
pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 5, 11).expect("2022-05-11 is a valid date")
}

/// Convert a calendar date into Pikabu's `d` search parameter.
///
/// Uses the whole-day difference between dates, so month lengths and leap
/// years need no special handling.
pub fn day_param(date: NaiveDate) -> i64 {
    REFERENCE_DAY_PARAM + date.signed_duration_since(reference_date()).num_days()
}

/// Builds search-results URLs for crawl cursors.
#[derive(Debug, Clone)]
pub struct SearchEndpoint {
    search_url: Url,
}

impl SearchEndpoint {
    /// Create an endpoint rooted at `base_url` (e.g. `https://pikabu.ru`).
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let search_url = Url::parse(base_url)?.join("/search")?;
        Ok(Self { search_url })
    }

    /// URL of the results page the cursor points at.
    pub fn page_url(&self, cursor: &CrawlCursor) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("n", "2")
            .append_pair("st", "3")
            .append_pair("d", &day_param(cursor.current_date).to_string())
            .append_pair("page", &cursor.page_num.to_string());
        url
    }
}

/// All story nodes on a results page, in document order.
pub fn story_nodes(document: &Html) -> Vec<ElementRef<'_>> {
    document.select(&STORY).collect()
}

/// `data-story-id` of a node, if it has one. Used for log context.
pub fn story_id(story: ElementRef<'_>) -> Option<&str> {
    story.value().attr("data-story-id")
}

/// Decide whether a story node is a sponsored post.
///
/// A node is an ad when any of these hold:
/// - no `data-author-id`
/// - `data-author-name` is [`SPONSOR_AUTHOR`]
/// - no `data-rating`
/// - no publication `<time>` element
///
/// The attribute checks run first so the subtree is only searched when
/// they all pass.
pub fn is_advertisement(story: ElementRef<'_>) -> bool {
    let node = story.value();
    node.attr("data-author-id").is_none()
        || node.attr("data-author-name") == Some(SPONSOR_AUTHOR)
        || node.attr("data-rating").is_none()
        || story.select(&DATETIME).next().is_none()
}

/// Extract a [`StoryRecord`] from a node that is not an ad.
///
/// Title, tags and body text are normalized. A story without a text block
/// yields an empty `text` and a `text_len` of zero.
///
/// # Errors
///
/// Returns [`ExtractError`] when a required attribute or element is missing,
/// or when `data-rating` / `data-comments` is not an integer.
pub fn extract(story: ElementRef<'_>) -> Result<StoryRecord, ExtractError> {
    let story_id = required_attr(story, "data-story-id")?.to_string();
    let author_id = required_attr(story, "data-author-id")?.to_string();
    let rating = parse_number("data-rating", required_attr(story, "data-rating")?)?;
    let comments_count = story
        .value()
        .attr("data-comments")
        .map(|raw| parse_number("data-comments", raw))
        .transpose()?;

    let story_datetime = story
        .select(&DATETIME)
        .next()
        .ok_or(ExtractError::MissingElement(DATETIME_SEL))?
        .value()
        .attr("datetime")
        .ok_or(ExtractError::MissingAttribute("datetime"))?
        .to_string();

    let title = story
        .select(&TITLE)
        .next()
        .map(|link| normalize(&element_text(link)))
        .ok_or(ExtractError::MissingElement(TITLE_SEL))?;

    let tags = story
        .select(&TAG)
        .map(|tag| normalize(&element_text(tag)))
        .collect();

    let text = story
        .select(&TEXT_BLOCK)
        .next()
        .map(|block| normalize(&element_text(block)))
        .unwrap_or_default();

    Ok(StoryRecord {
        story_id,
        author_id,
        text_len: text.chars().count(),
        rating,
        comments_count,
        tags,
        story_datetime,
        title,
        text,
    })
}

fn required_attr<'a>(story: ElementRef<'a>, attr: &'static str) -> Result<&'a str, ExtractError> {
    story
        .value()
        .attr(attr)
        .ok_or(ExtractError::MissingAttribute(attr))
}

fn parse_number<T: FromStr>(attr: &'static str, raw: &str) -> Result<T, ExtractError> {
    raw.trim().parse().map_err(|_| ExtractError::InvalidNumber {
        attr,
        value: raw.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}
