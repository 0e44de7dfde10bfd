//! Site and crawl settings.
//!
//! Everything that describes the target site (base URL, labels, slugs) or tunes
//! the crawl (timings, caps) lives in [`CrawlConfig`]. Values come from three
//! layers, later ones winning: built-in defaults, an optional YAML file, and
//! command-line overrides applied in `main`.
//!
//! # Example file
//!
//! ```yaml
//! base_url: https://www.x.cn
//! sections:
//!   - label: 看盘
//!   - label: 公司
//!     slug: company
//! max_load_more: 8
//! settle_ms: 1500
//! ```

use crate::models::Section;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Site root, without trailing slash.
    pub base_url: String,
    /// Path of the telegraph feed below `base_url`.
    pub parent_path: String,
    /// Visible text of the top navigation link leading to the feed.
    pub parent_label: String,
    /// Sections crawled when none are given on the command line.
    pub sections: Vec<Section>,
    /// Links whose bounding box starts below this many pixels are not top navigation.
    pub top_band_px: f64,
    /// Upper bound on load-more attempts per section. `0` reads only the first page.
    pub max_load_more: usize,
    pub max_comments: usize,
    pub keyword_count: usize,
    /// Candidate texts shorter than this (in characters) are skipped.
    pub min_candidate_chars: usize,
    pub settle_ms: u64,
    pub idle_timeout_ms: u64,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.x.cn".to_string(),
            parent_path: "/telegraph".to_string(),
            parent_label: "电报".to_string(),
            sections: vec![Section::new("看盘"), Section::new("公司")],
            top_band_px: 100.0,
            max_load_more: 5,
            max_comments: 50,
            keyword_count: 5,
            min_candidate_chars: 10,
            settle_ms: 2000,
            idle_timeout_ms: 30_000,
            delay_min_ms: 1000,
            delay_max_ms: 3000,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl CrawlConfig {
    /// Absolute URL of the telegraph feed.
    pub fn parent_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.parent_path)
    }

    /// Absolute URL of one section tab.
    pub fn section_url(&self, section: &Section) -> String {
        format!("{}/{}", self.parent_url().trim_end_matches('/'), section.slug())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Reject settings the crawl cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {}: {e}", self.base_url)))?;
        if self.delay_min_ms > self.delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "delay_min_ms ({}) exceeds delay_max_ms ({})",
                self.delay_min_ms, self.delay_max_ms
            )));
        }
        if self.sections.iter().any(|s| s.label.trim().is_empty()) {
            return Err(ConfigError::Invalid("section labels must not be empty".into()));
        }
        Ok(())
    }
}

/// Parse YAML config text. Missing keys keep their defaults.
pub fn parse_config(yaml: &str) -> Result<CrawlConfig, ConfigError> {
    let config: CrawlConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a YAML config file.
///
/// # Arguments
///
/// * `path` - Location of the YAML file
///
/// # Returns
///
/// The merged configuration, or an error if the file is unreadable, malformed
/// or fails validation.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_config(path: &Path) -> Result<CrawlConfig, ConfigError> {
    let yaml = tokio::fs::read_to_string(path).await?;
    let config = parse_config(&yaml)?;
    info!(sections = config.sections.len(), "Loaded crawl configuration");
    Ok(config)
}
