//! Utility functions for time parsing, pacing, string manipulation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Parsing the cutoff and end instants given on the command line
//! - Randomized pauses between page loads
//! - Shortening long text for log fields
//! - Checking the output directory before a run

use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use rand::{Rng, rng};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a local instant in `YYYY-MM-DD HH:MM[:SS]` form.
///
/// A bare `YYYY-MM-DD` is accepted and means midnight.
///
/// # Returns
///
/// The parsed instant, or `None` if no accepted format matches.
pub fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// The cutoff used when none is given: `days` before now.
pub fn default_cutoff(days: i64) -> NaiveDateTime {
    Local::now().naive_local() - ChronoDuration::days(days)
}

/// Pick a pause uniformly from `[min_ms, max_ms]`.
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng().random_range(min_ms..=max_ms))
}

/// Shorten page text or model output before it goes into a log field.
///
/// Counts characters rather than bytes, since most of what we log is CJK.
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((cut, _)) => {
            let dropped = s[cut..].chars().count();
            format!("{}…(+{dropped} chars)", &s[..cut])
        }
    }
}

/// Create `path` if needed and prove a file can be written there.
///
/// Run before the browser starts so a bad output path fails fast instead of
/// after a full crawl.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe = Path::new(path).join(".telegraph_pulse_probe");
    fs::write(&probe, b"ok").await?;
    if let Err(e) = fs::remove_file(&probe).await {
        warn!(error = %e, "Could not remove write probe");
    }
    info!("Output directory is writable");
    Ok(())
}
