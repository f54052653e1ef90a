//! Text normalization, log-friendly truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - [`normalize`] for every free-text field pulled out of story markup
//! - [`truncate_for_log`] for keeping titles short in log lines
//! - [`ensure_parent_dir`] for validating output locations before a run starts

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Token substituted for every link before punctuation is stripped.
///
/// After normalization the token reads as the two words `some link`.
pub const LINK_PLACEHOLDER: &str = "<some_link>";

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(https?://)\s*(www\.)?\s*((\w|\s|-)+\.)*([\w\-\s]+/)*([\w\-?.]+)((\?)?[\w\s]*=\s*[\w%&]*)*",
    )
    .expect("link pattern is valid")
});

/// Normalize free text pulled out of story markup.
///
/// Links are replaced with [`LINK_PLACEHOLDER`], every ASCII punctuation
/// character becomes a space, and whitespace runs collapse to single spaces
/// with no leading or trailing whitespace.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize("Hi, see https://www.example.com/a?b=1 now!"), "Hi see some link now");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    let linked = LINK_RE.replace_all(text, LINK_PLACEHOLDER);
    let spaced: String = linked
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped characters appended. Counts characters rather than bytes so
/// Cyrillic titles never split inside a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// Ensure the directory that will hold `path` exists and is writable.
///
/// Creates missing parent directories, then performs a write test by creating
/// and immediately deleting a probe file next to `path`.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;

    let probe_path = dir.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
