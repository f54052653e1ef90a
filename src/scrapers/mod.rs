//! Site-specific markup knowledge.
//!
//! Each scraper module knows two things about its site:
//!
//! 1. **Addressing**: how to build the search-results URL for a crawl cursor
//! 2. **Extraction**: how to find story nodes on a results page and turn one
//!    node into a [`StoryRecord`](crate::models::StoryRecord)
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Pikabu | [`pikabu`] | HTML scraping | Text posts from `/search`, sorted by relevance |

pub mod pikabu;
