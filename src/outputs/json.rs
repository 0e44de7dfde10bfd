//! JSON report output.
//!
//! Reports are grouped by the local date of the run, one file per run:
//! ```text
//! json_output_dir/
//! └── 2025-04-11/
//!     ├── telegraph_091502.json
//!     └── telegraph_153000.json
//! ```

use crate::models::CrawlReport;
use chrono::NaiveDateTime;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the report file for a run started at `started`.
pub fn report_path(json_output_dir: &str, started: NaiveDateTime) -> PathBuf {
    PathBuf::from(json_output_dir)
        .join(started.format("%Y-%m-%d").to_string())
        .join(format!("telegraph_{}.json", started.format("%H%M%S")))
}

/// Write a [`CrawlReport`] as pretty-printed JSON.
///
/// # Arguments
///
/// * `report` - The finished run
/// * `json_output_dir` - Base directory for JSON output
/// * `started` - Local time the run started, which names the file
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(
    report: &CrawlReport,
    json_output_dir: &str,
    started: NaiveDateTime,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(json_output_dir, started);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), posts = report.posts.len(), "Wrote JSON report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_instant;

    #[test]
    fn test_report_path_layout() {
        let started = parse_instant("2025-04-11 09:15:02").unwrap();
        assert_eq!(
            report_path("/data/out", started),
            PathBuf::from("/data/out/2025-04-11/telegraph_091502.json")
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_dated_directory() {
        let dir = std::env::temp_dir().join(format!("telegraph_pulse_json_{}", std::process::id()));
        let dir_str = dir.to_string_lossy().to_string();
        let started = parse_instant("2025-04-11 15:30:00").unwrap();
        let report = CrawlReport {
            generated_at: "2025-04-11T15:30:00+08:00".to_string(),
            cutoff: parse_instant("2025-04-10 15:30:00").unwrap(),
            until: None,
            sections: vec![],
            posts: vec![],
        };

        let path = write_report(&report, &dir_str, started).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(path.ends_with("2025-04-11/telegraph_153000.json"));
        assert!(written.contains(r#""cutoff": "2025-04-10T15:30:00""#));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
