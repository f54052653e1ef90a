//! Persistence for crawled stories.
//!
//! # Submodules
//!
//! - [`store`]: Append-only CSV writer used while crawling
//! - [`dedup`]: Offline pass that turns the raw store into a clean, sorted copy
//!
//! # Output Structure
//!
//! ```text
//! db.csv          # raw store, header + one row per accepted story, duplicates allowed
//! cleaned_db.csv  # dedup output, header + one row per story_id, sorted by story_datetime
//! ```

pub mod dedup;
pub mod store;
