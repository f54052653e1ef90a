//! Offline cleanup of the accumulated store.
//!
//! The crawler revisits stories whenever the same story shows up under more
//! than one date or page, so the raw store holds duplicates. This pass reads
//! the whole store, keeps the first row seen for every `story_id`, sorts the
//! survivors by `story_datetime`, and writes them once to a new file.
//!
//! Rows are carried through as raw CSV records, so any cell encoding the
//! store uses (tags included) survives unchanged. Sorting compares the
//! timestamp text, not a parsed date, and is stable.
//!
//! Running the pass on its own output reproduces that output byte for byte.

use crate::error::StoreError;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use itertools::Itertools;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, instrument};

const ID_COLUMN: &str = "story_id";
const DATETIME_COLUMN: &str = "story_datetime";

/// What a dedup run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    /// Data rows read from the input (header excluded).
    pub rows_read: usize,
    /// Distinct story ids, which is also the number of rows written.
    pub unique_records: usize,
}

/// Deduplicate the store at `input` into a new file at `output`.
///
/// The cleaned rows are built in memory and the output is only created once
/// the whole input has been read, so a failed run leaves `output` untouched.
/// `output` must not name the same file as `input`.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn dedup_store(input: &Path, output: &Path) -> Result<DedupReport, StoreError> {
    if output.exists() && fs::canonicalize(input)? == fs::canonicalize(output)? {
        return Err(StoreError::OutputIsInput(output.to_path_buf()));
    }

    let reader = File::open(input)?;
    let mut cleaned = Vec::new();
    let report = dedup_rows(reader, &mut cleaned)?;
    fs::write(output, cleaned)?;
    info!(
        rows_read = report.rows_read,
        unique = report.unique_records,
        "{} unique records",
        report.unique_records
    );
    Ok(report)
}

/// Core transform: header-led CSV in, header-led CSV out.
///
/// # Errors
///
/// Fails on unreadable or ragged CSV, on a header without `story_id` or
/// `story_datetime`, and on any write error.
pub fn dedup_rows<R: Read, W: Write>(input: R, output: W) -> Result<DedupReport, StoreError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(input);
    let header = rdr.headers()?.clone();
    let id_idx = column_index(&header, ID_COLUMN)?;
    let dt_idx = column_index(&header, DATETIME_COLUMN)?;

    let rows = rdr.records().collect::<Result<Vec<StringRecord>, _>>()?;
    let rows_read = rows.len();

    let mut unique: Vec<StringRecord> = rows
        .into_iter()
        .unique_by(|row| row.get(id_idx).unwrap_or_default().to_string())
        .collect();
    // `sort_by` is stable, so rows with equal timestamps keep file order.
    unique.sort_by(|a, b| {
        a.get(dt_idx)
            .unwrap_or_default()
            .cmp(b.get(dt_idx).unwrap_or_default())
    });

    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(output);
    wtr.write_record(&header)?;
    for row in &unique {
        wtr.write_record(row)?;
    }
    wtr.flush()?;

    Ok(DedupReport {
        rows_read,
        unique_records: unique.len(),
    })
}

fn column_index(header: &StringRecord, name: &'static str) -> Result<usize, StoreError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or(StoreError::MissingColumn(name))
}
