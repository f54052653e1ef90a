//! Append-only CSV store for accepted stories.
//!
//! The store is only ever appended to. Every [`AppendOnlyStore::append`]
//! writes exactly one row and flushes it, so a crash loses at most the row
//! being written. Duplicate story ids are expected here; they are removed
//! later by [`dedup`](crate::outputs::dedup).
//!
//! # Row Layout
//!
//! Columns follow [`STORE_HEADER`]. Tags are a JSON array in one cell,
//! `comments_count` is empty when the site did not report it.

use crate::error::StoreError;
use crate::models::{STORE_HEADER, StoryRecord};
use csv::{Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Row writer over any byte sink.
#[derive(Debug)]
pub struct AppendOnlyStore<W: Write> {
    writer: Writer<W>,
}

impl AppendOnlyStore<File> {
    /// Open `path` for appending, creating it if needed.
    ///
    /// The header row is written only when the file is new or empty, so
    /// reopening an existing store never produces a second header.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut store = Self::from_writer(file);
        if is_empty {
            store.writer.write_record(STORE_HEADER)?;
            store.writer.flush()?;
            info!("Initialized new store with header");
        } else {
            info!("Appending to existing store");
        }
        Ok(store)
    }
}

impl<W: Write> AppendOnlyStore<W> {
    /// Wrap a sink without writing a header.
    pub fn from_writer(sink: W) -> Self {
        let writer = WriterBuilder::new().has_headers(false).from_writer(sink);
        Self { writer }
    }

    /// Append one record as one row and flush it.
    ///
    /// # Errors
    ///
    /// Any I/O failure is returned as [`StoreError`]; callers should treat it
    /// as fatal rather than drop the record.
    pub fn append(&mut self, record: &StoryRecord) -> Result<(), StoreError> {
        self.writer.write_record(record.to_row()?)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying sink.
    pub fn into_inner(self) -> Result<W, StoreError> {
        self.writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))
    }
}
