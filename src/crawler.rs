//! The crawl loop.
//!
//! [`Crawler`] walks the `(page, date)` space one search page at a time:
//!
//! 1. Build the search URL for the current [`CrawlCursor`]
//! 2. Fetch it through a [`PageSource`] (a failed fetch counts as an empty page)
//! 3. For every story node: skip ads, extract, keep stories whose normalized
//!    text is long enough, append them to the store
//! 4. Stop if the target is reached or an interrupt was requested, otherwise
//!    advance the cursor (date first, then page)
//!
//! Everything runs sequentially. The only waits are the fetch itself, the
//! fetcher's failure cooldown, and a short jittered delay between date steps.
//!
//! # Errors
//!
//! Extraction failures are counted and logged per story and never stop the
//! page. A store write failure is fatal and ends the run with
//! [`CrawlError::Store`].

use crate::config::CrawlConfig;
use crate::error::{ConfigError, CrawlError, StoreError};
use crate::fetcher::PageSource;
use crate::models::{CrawlCounters, CrawlCursor, CrawlOutcome, CursorStep};
use crate::outputs::store::AppendOnlyStore;
use crate::scrapers::pikabu::{self, SearchEndpoint};
use crate::utils::truncate_for_log;
use scraper::Html;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Final report of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub outcome: CrawlOutcome,
    pub counters: CrawlCounters,
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Emit the end-of-run log line.
    pub fn log(&self) {
        let verb = match self.outcome {
            CrawlOutcome::Interrupted => "The crawler was interrupted",
            _ => "The crawler finished the job",
        };
        info!(
            outcome = %self.outcome,
            added = self.counters.current_data_count,
            parsed = self.counters.all_story_count,
            errors = self.counters.number_of_errors,
            elapsed = ?self.elapsed,
            "{verb}. Added {} stories. Parsed {} stories. Total time: {:?}",
            self.counters.current_data_count,
            self.counters.all_story_count,
            self.elapsed
        );
    }
}

/// Sequential crawler over Pikabu search results.
pub struct Crawler<S, W>
where
    S: PageSource,
    W: Write,
{
    config: CrawlConfig,
    endpoint: SearchEndpoint,
    source: S,
    store: AppendOnlyStore<W>,
    cursor: CrawlCursor,
    counters: CrawlCounters,
    stop: Arc<AtomicBool>,
}

impl<S, W> Crawler<S, W>
where
    S: PageSource,
    W: Write,
{
    /// Create a crawler positioned at `(start_page, from_date)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn new(
        config: CrawlConfig,
        source: S,
        store: AppendOnlyStore<W>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoint = SearchEndpoint::new(&config.base_url)?;
        let cursor = CrawlCursor::new(config.start_page, config.from_date);
        Ok(Self {
            config,
            endpoint,
            source,
            store,
            cursor,
            counters: CrawlCounters::default(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that, once set, ends the run after the page in flight.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn counters(&self) -> CrawlCounters {
        self.counters
    }

    /// Consume the crawler and return its store.
    pub fn into_store(self) -> AppendOnlyStore<W> {
        self.store
    }

    /// Run until the target is reached, the search space is exhausted, or a
    /// stop is requested.
    ///
    /// Cursor and counters are reset at the start of every run.
    #[instrument(level = "info", skip_all, fields(from = %self.config.from_date, until = %self.config.until_date, target = self.config.target_records))]
    pub async fn run(&mut self) -> Result<CrawlSummary, CrawlError> {
        let t0 = Instant::now();
        self.cursor = CrawlCursor::new(self.config.start_page, self.config.from_date);
        self.counters = CrawlCounters::default();

        let outcome = loop {
            self.crawl_page().await?;

            if self.target_reached() {
                break CrawlOutcome::TargetReached;
            }
            if self.stop.load(Ordering::SeqCst) {
                break CrawlOutcome::Interrupted;
            }

            match self.cursor.advance(
                self.config.from_date,
                self.config.until_date,
                self.config.max_page,
            ) {
                CursorStep::NextDate => sleep(self.jittered_delay()).await,
                CursorStep::NextPage => {}
                CursorStep::Exhausted => break CrawlOutcome::SpaceExhausted,
            }
        };

        Ok(CrawlSummary {
            outcome,
            counters: self.counters,
            elapsed: t0.elapsed(),
        })
    }

    async fn crawl_page(&mut self) -> Result<(), StoreError> {
        let url = self.endpoint.page_url(&self.cursor);
        info!(
            page = self.cursor.page_num,
            date = %self.cursor.current_date,
            "start parse page #{}, stories date: {}",
            self.cursor.page_num,
            self.cursor.current_date
        );

        let page = self.source.fetch(url.as_str()).await;
        match page {
            Some(document) => self.process_document(&document),
            None => Ok(()),
        }
    }

    fn process_document(&mut self, document: &Html) -> Result<(), StoreError> {
        for node in pikabu::story_nodes(document) {
            let id = pikabu::story_id(node).unwrap_or("<unknown>");

            if pikabu::is_advertisement(node) {
                info!(story_id = %id, "story {id} is ad");
                continue;
            }

            let record = match pikabu::extract(node) {
                Ok(record) => record,
                Err(e) => {
                    self.counters.number_of_errors += 1;
                    error!(
                        story_id = %id,
                        error_number = self.counters.number_of_errors,
                        error = %e,
                        "exception #{} while extracting story {id}",
                        self.counters.number_of_errors
                    );
                    continue;
                }
            };
            self.counters.all_story_count += 1;

            if record.text_len < self.config.min_text_len {
                info!(story_id = %id, text_len = record.text_len, "story {id} is short");
                continue;
            }

            self.store.append(&record)?;
            self.counters.current_data_count += 1;
            info!(
                story_id = %id,
                title = %truncate_for_log(&record.title, 80),
                "story {id} added. Added {} stories",
                self.counters.current_data_count
            );

            if self.target_reached() {
                break;
            }
        }
        Ok(())
    }

    fn target_reached(&self) -> bool {
        self.counters.current_data_count >= self.config.target_records
    }

    /// Base step delay plus up to the same amount of random extra.
    fn jittered_delay(&self) -> Duration {
        let base = self.config.step_delay();
        base + base.mul_f64(rand::random::<f64>())
    }
}

/// Relay operator interrupts to a running crawl.
///
/// The first interrupt sets `stop`, so the crawl ends after its current page.
/// Returns `true` when a second interrupt arrives and the caller should exit
/// at once, or `false` if the signal source fails first.
pub async fn watch_interrupts<F, Fut>(stop: Arc<AtomicBool>, mut next_interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupt received; stopping after the current page (press Ctrl+C again to force exit)");
    stop.store(true, Ordering::SeqCst);

    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("Second interrupt received; exiting without waiting for the page");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    /// In-memory pages keyed by URL; unknown URLs behave like failed fetches.
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl PageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Option<Html> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages.get(url).map(|html| Html::parse_document(html))
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn config(from: NaiveDate, until: NaiveDate, target: u64) -> CrawlConfig {
        CrawlConfig {
            from_date: from,
            until_date: until,
            target_records: target,
            step_delay_ms: 0,
            ..CrawlConfig::default()
        }
    }

    fn url(page: u32, date: NaiveDate) -> String {
        SearchEndpoint::new("https://pikabu.ru")
            .unwrap()
            .page_url(&CrawlCursor::new(page, date))
            .to_string()
    }

    fn story(id: &str, attrs: &str, text_chars: usize) -> String {
        let body = "a".repeat(text_chars);
        format!(
            r#"<article class="story" data-story-id="{id}" {attrs}>
                 <a class="story__title-link">Story {id}</a>
                 <time class="caption story__datetime hint" datetime="2020-01-0{id}T00:00:00+03:00"></time>
                 <div class="story-block story-block_type_text">{body}</div>
               </article>"#
        )
    }

    fn long_story(id: &str) -> String {
        story(id, r#"data-author-id="1" data-rating="5""#, 2000)
    }

    fn page(stories: &[String]) -> String {
        format!("<html><body>{}</body></html>", stories.concat())
    }

    fn crawler(
        config: CrawlConfig,
        source: FakeSource,
    ) -> Crawler<FakeSource, Vec<u8>> {
        Crawler::new(config, source, AppendOnlyStore::from_writer(Vec::new())).unwrap()
    }

    fn stored_ids(crawler: Crawler<FakeSource, Vec<u8>>) -> Vec<String> {
        let bytes = crawler.into_store().into_inner().unwrap();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice());
        rdr.records().map(|r| r.unwrap()[0].to_string()).collect()
    }

    #[tokio::test]
    async fn test_halts_when_target_reached_mid_page() {
        let mut source = FakeSource::default();
        source.pages.insert(
            url(1, day(1)),
            page(&[long_story("1"), long_story("2"), long_story("3")]),
        );

        let mut crawler = crawler(config(day(1), day(5), 2), source);
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::TargetReached);
        assert_eq!(summary.counters.current_data_count, 2);
        assert_eq!(summary.counters.all_story_count, 2);
        assert_eq!(crawler.source.requested.borrow().len(), 1);
        assert_eq!(stored_ids(crawler), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_visits_dates_before_pages_and_exhausts() {
        let cfg = CrawlConfig {
            max_page: 2,
            ..config(day(1), day(2), 10)
        };
        let mut crawler = crawler(cfg, FakeSource::default());
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::SpaceExhausted);
        assert_eq!(summary.counters, CrawlCounters::default());
        assert_eq!(
            *crawler.source.requested.borrow(),
            vec![url(1, day(1)), url(1, day(2)), url(2, day(1)), url(2, day(2))]
        );
    }

    #[tokio::test]
    async fn test_stops_after_page_one_hundred() {
        let mut crawler = crawler(config(day(3), day(3), 1), FakeSource::default());
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::SpaceExhausted);
        let requested = crawler.source.requested.borrow();
        assert_eq!(requested.len(), 100);
        assert_eq!(requested[99], url(100, day(3)));
    }

    #[tokio::test]
    async fn test_start_page_is_honored() {
        let cfg = CrawlConfig {
            start_page: 99,
            ..config(day(1), day(1), 1)
        };
        let mut crawler = crawler(cfg, FakeSource::default());
        crawler.run().await.unwrap();
        assert_eq!(
            *crawler.source.requested.borrow(),
            vec![url(99, day(1)), url(100, day(1))]
        );
    }

    #[tokio::test]
    async fn test_filters_ads_short_and_broken_stories() {
        let mut source = FakeSource::default();
        source.pages.insert(
            url(1, day(1)),
            page(&[
                story("1", r#"data-author-id="1" data-author-name="pikabu.deals" data-rating="5""#, 3000),
                story("2", r#"data-author-id="1" data-rating="5""#, 1999),
                story("3", r#"data-author-id="1" data-rating="five""#, 3000),
                long_story("4"),
            ]),
        );

        let cfg = CrawlConfig {
            max_page: 1,
            ..config(day(1), day(1), 10)
        };
        let mut crawler = crawler(cfg, source);
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::SpaceExhausted);
        assert_eq!(
            summary.counters,
            CrawlCounters {
                current_data_count: 1,
                all_story_count: 2,
                number_of_errors: 1,
            }
        );
        assert_eq!(stored_ids(crawler), vec!["4"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_advances_cursor() {
        let mut source = FakeSource::default();
        // Day 1 is missing from the fake, so its fetch fails.
        source.pages.insert(url(1, day(2)), page(&[long_story("2")]));

        let mut crawler = crawler(config(day(1), day(2), 1), source);
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::TargetReached);
        assert_eq!(
            *crawler.source.requested.borrow(),
            vec![url(1, day(1)), url(1, day(2))]
        );
    }

    #[tokio::test]
    async fn test_interrupt_finishes_current_page() {
        let mut source = FakeSource::default();
        source.pages.insert(url(1, day(1)), page(&[long_story("1")]));

        let mut crawler = crawler(config(day(1), day(9), 10), source);
        crawler.stop_handle().store(true, Ordering::SeqCst);
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::Interrupted);
        assert_eq!(summary.counters.current_data_count, 1);
        assert_eq!(crawler.source.requested.borrow().len(), 1);
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let mut source = FakeSource::default();
        source.pages.insert(url(1, day(1)), page(&[long_story("1")]));

        let mut crawler = Crawler::new(
            config(day(1), day(1), 5),
            source,
            AppendOnlyStore::from_writer(BrokenSink),
        )
        .unwrap();
        let err = crawler.run().await.unwrap_err();
        assert!(matches!(err, CrawlError::Store(_)));
        assert_eq!(crawler.counters().current_data_count, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Crawler::new(
            config(day(2), day(1), 1),
            FakeSource::default(),
            AppendOnlyStore::from_writer(Vec::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let stop = Arc::new(AtomicBool::new(false));
        let forced = watch_interrupts(Arc::clone(&stop), || async { Ok(()) }).await;
        assert!(forced);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_single_interrupt_only_requests_stop() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut signals = 0;
        let forced = watch_interrupts(Arc::clone(&stop), || {
            signals += 1;
            let first = signals == 1;
            async move {
                if first {
                    Ok(())
                } else {
                    Err(io::Error::other("signal stream closed"))
                }
            }
        })
        .await;
        assert!(!forced);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_broken_signal_source_leaves_crawl_running() {
        let stop = Arc::new(AtomicBool::new(false));
        let forced = watch_interrupts(Arc::clone(&stop), || async {
            Err(io::Error::other("no handler"))
        })
        .await;
        assert!(!forced);
        assert!(!stop.load(Ordering::SeqCst));
    }
}
