//! Search-page fetching with a fixed cooldown on failure.
//!
//! The crawler talks to the network only through the [`PageSource`] trait:
//! - [`PageSource`]: Core trait, "give me the parsed page at this URL, or nothing"
//! - [`HttpPageSource`]: The real implementation on top of `reqwest`
//!
//! # Failure Policy
//!
//! There is no retry. A request that times out, fails to connect, or returns
//! an unreadable body is logged, followed by a long cooldown sleep, and then
//! reported as `None`. The crawler treats `None` as a page with zero stories
//! and moves on to the next cursor position.

use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use scraper::Html;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Browser user agents rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
];

/// Pick a user agent for the next request.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Something that can turn a search URL into a parsed page.
///
/// Implementors must not return errors: a page that cannot be obtained is
/// `None`, and any waiting that should follow a failure happens inside
/// `fetch` before it returns.
pub trait PageSource {
    /// Fetch and parse the page at `url`.
    async fn fetch(&self, url: &str) -> Option<Html>;
}

/// [`PageSource`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    /// Shared client; carries the per-request timeout.
    client: Client,
    /// Sleep applied after any failed request.
    cooldown: Duration,
}

impl HttpPageSource {
    /// Build a fetcher with the given request timeout and failure cooldown.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let source = HttpPageSource::new(Duration::from_secs(6), Duration::from_secs(60))?;
    /// ```
    pub fn new(timeout: Duration, cooldown: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, cooldown })
    }

    async fn get_body(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await?;
        debug!(status = %response.status(), "Search page responded");
        response.text().await
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Option<Html> {
        let t0 = Instant::now();
        match self.get_body(url).await {
            Ok(body) => {
                debug!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    bytes = body.len(),
                    "Fetched search page"
                );
                Some(Html::parse_document(&body))
            }
            Err(e) => {
                info!(
                    %url,
                    error = %e,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Timeout on page; cooling down"
                );
                sleep(self.cooldown).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_comes_from_pool() {
        for _ in 0..50 {
            let ua = random_user_agent();
            assert!(USER_AGENTS.contains(&ua));
            assert!(ua.starts_with("Mozilla/5.0"));
        }
    }

    #[tokio::test]
    async fn test_connection_failure_yields_none() {
        let source = HttpPageSource::new(Duration::from_millis(500), Duration::ZERO).unwrap();
        // Port 9 on loopback has nothing listening.
        let page = source.fetch("http://127.0.0.1:9/search?page=1").await;
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_yields_none() {
        let source = HttpPageSource::new(Duration::from_millis(500), Duration::ZERO).unwrap();
        assert!(source.fetch("not a url").await.is_none());
    }
}
