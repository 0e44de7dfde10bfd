//! Command-line interface definitions for Telegraph Pulse.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Options given here override the YAML config file, which in turn overrides
//! the built-in defaults.

use crate::analysis::SentimentBackendKind;
use clap::Parser;

/// Command-line arguments for the Telegraph Pulse crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl the default sections for the last 24 hours
/// telegraph_pulse -j ./json
///
/// # One section, a fixed window, LLM sentiment
/// telegraph_pulse -j ./json --sections 公司 --cutoff "2025-04-11 00:00" \
///     --until "2025-04-11 18:00" --sentiment-backend llm
///
/// # Watch the browser while debugging
/// telegraph_pulse -j ./json --headless false --debug
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON report
    #[arg(short, long)]
    pub json_output_dir: String,

    /// Optional path to a crawl config YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Comma-separated section labels to crawl, e.g. "看盘,公司"
    #[arg(long, value_delimiter = ',')]
    pub sections: Vec<String>,

    /// Earliest post time to keep, "YYYY-MM-DD HH:MM[:SS]" (default: 24 hours ago)
    #[arg(long)]
    pub cutoff: Option<String>,

    /// Latest post time to keep, same format as --cutoff
    #[arg(long)]
    pub until: Option<String>,

    /// Run the browser without a window
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Log at debug level when RUST_LOG is not set
    #[arg(long)]
    pub debug: bool,

    /// Sentiment backend for comment analysis
    #[arg(long, value_enum, default_value = "lexicon")]
    pub sentiment_backend: SentimentBackendKind,

    /// awful_aj chat template used by the LLM sentiment backend
    #[arg(long, default_value = "comment_sentiment")]
    pub sentiment_template: String,

    /// Maximum load-more attempts per section (0 reads only the first page)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// WebDriver server (chromedriver) URL
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "telegraph_pulse",
            "--json-output-dir",
            "./json",
            "--sections",
            "看盘,公司",
            "--cutoff",
            "2025-04-11 00:00",
            "--sentiment-backend",
            "llm",
            "--max-pages",
            "8",
        ]);

        assert_eq!(cli.json_output_dir, "./json");
        assert_eq!(cli.sections, vec!["看盘", "公司"]);
        assert_eq!(cli.cutoff.as_deref(), Some("2025-04-11 00:00"));
        assert_eq!(cli.sentiment_backend, SentimentBackendKind::Llm);
        assert_eq!(cli.max_pages, Some(8));
    }

    #[test]
    fn test_cli_defaults_and_short_flags() {
        let cli = Cli::parse_from(["telegraph_pulse", "-j", "/tmp/json", "-c", "crawl.yaml"]);

        assert_eq!(cli.json_output_dir, "/tmp/json");
        assert_eq!(cli.config.as_deref(), Some("crawl.yaml"));
        assert!(cli.sections.is_empty());
        assert!(cli.headless);
        assert!(!cli.debug);
        assert_eq!(cli.sentiment_backend, SentimentBackendKind::Lexicon);
        assert_eq!(cli.sentiment_template, "comment_sentiment");
    }

    #[test]
    fn test_headless_can_be_disabled() {
        let cli = Cli::parse_from(["telegraph_pulse", "-j", "out", "--headless", "false"]);
        assert!(!cli.headless);
    }
}
