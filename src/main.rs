//! # Telegraph Pulse
//!
//! Crawls the "telegraph" flash-news feed of a Chinese financial news site
//! section by section, collects the comments under each post, and attaches a
//! sentiment verdict and keywords to every post inside a requested time window.
//!
//! ## Features
//!
//! - Drives a real browser over WebDriver, tolerating several DOM layouts
//! - Stops each section exactly at the cutoff without skipping or repeating posts
//! - Scores comment sentiment with a local lexicon or an OpenAI-compatible LLM
//! - Writes a dated JSON report and prints a plain-text summary
//!
//! ## Usage
//!
//! ```sh
//! chromedriver --port=9515 &
//! telegraph_pulse -j ./json --sections 看盘,公司 --cutoff "2025-04-11 00:00"
//! ```
//!
//! ## Architecture
//!
//! 1. **Navigation**: Reach the feed and open each section tab
//! 2. **Extraction**: Parse posts from the page and admit those in the window
//! 3. **Comments**: Open each admitted post's comments and step back
//! 4. **Analysis**: Score sentiment and rank keywords side by side
//! 5. **Pagination**: Load more and repeat until the section is done
//! 6. **Output**: Write the JSON report and print the summary

use awful_aj::{config as aj_config, config_dir, template};
use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod api;
mod browser;
mod cli;
mod config;
mod models;
mod orchestrator;
mod outputs;
mod scrapers;
mod utils;

use analysis::keywords::FrequencyKeywords;
use analysis::lexicon::LexiconAnalyzer;
use analysis::llm::LlmAnalyzer;
use analysis::merge::ResultMerger;
use analysis::{SentimentBackend, SentimentBackendKind};
use browser::Page;
use browser::webdriver::{SessionOptions, WebDriverSession, wait_until_ready};
use cli::Cli;
use config::{CrawlConfig, load_config};
use models::{CrawlReport, Section};
use orchestrator::Orchestrator;
use outputs::{json, text};
use scrapers::cutoff::Window;
use utils::{default_cutoff, ensure_writable_dir, parse_instant};

/// Probes of the WebDriver status endpoint before giving up.
const WEBDRIVER_READY_ATTEMPTS: usize = 30;

/// Resolve requested labels against the configured sections so that
/// configured slugs are kept. Unknown labels get the default slug.
fn resolve_sections(requested: &[String], configured: &[Section]) -> Vec<Section> {
    if requested.is_empty() {
        return configured.to_vec();
    }
    requested
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(|label| {
            configured
                .iter()
                .find(|s| s.label == label)
                .cloned()
                .unwrap_or_else(|| Section::new(label))
        })
        .collect()
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let started = Local::now();
    info!("telegraph_pulse starting up");
    debug!(?args, "Parsed CLI arguments");

    // ---- Crawl configuration ----
    let mut crawl_config = match &args.config {
        Some(path) => load_config(Path::new(path)).await?,
        None => CrawlConfig::default(),
    };
    if let Some(max_pages) = args.max_pages {
        crawl_config.max_load_more = max_pages;
    }
    crawl_config.validate()?;
    let sections = resolve_sections(&args.sections, &crawl_config.sections);

    // ---- Time window ----
    let cutoff = match &args.cutoff {
        Some(raw) => parse_instant(raw).ok_or_else(|| format!("invalid --cutoff {raw:?}"))?,
        None => default_cutoff(1),
    };
    let until = match &args.until {
        Some(raw) => Some(parse_instant(raw).ok_or_else(|| format!("invalid --until {raw:?}"))?),
        None => None,
    };
    if until.is_some_and(|end| end < cutoff) {
        return Err("--until is earlier than --cutoff".into());
    }
    info!(%cutoff, until = ?until, sections = ?sections.iter().map(|s| &s.label).collect::<Vec<_>>(), "Crawl window");

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Sentiment backend ----
    let llm = match args.sentiment_backend {
        SentimentBackendKind::Llm => {
            let template = template::load_template(&args.sentiment_template).await?;
            info!(template = %args.sentiment_template, "Loaded template");
            let conf_file = config_dir()?.join("config.yaml");
            let config_path = conf_file.to_str().ok_or("Not a valid config filename")?;
            let config = aj_config::load_config(config_path)?;
            info!(config_path, "Loaded LLM configuration");
            Some((config, template))
        }
        SentimentBackendKind::Lexicon => None,
    };
    let backend = match &llm {
        Some((config, template)) => SentimentBackend::Llm(LlmAnalyzer { config, template }),
        None => SentimentBackend::Lexicon(LexiconAnalyzer),
    };
    let merger = ResultMerger::new(backend, FrequencyKeywords, crawl_config.keyword_count);
    let orchestrator = Orchestrator::new(
        &crawl_config,
        Window::new(cutoff, until),
        started.date_naive(),
        merger,
    );

    // ---- Browser session ----
    wait_until_ready(&args.webdriver_url, WEBDRIVER_READY_ATTEMPTS, Duration::from_secs(1)).await?;
    let session = WebDriverSession::connect(&SessionOptions {
        server_url: args.webdriver_url.clone(),
        headless: args.headless,
        window_width: crawl_config.window_width,
        window_height: crawl_config.window_height,
    })
    .await?;
    let mut page = Page::new(session, crawl_config.settle(), crawl_config.idle_timeout());

    // ---- Crawl ----
    let output = orchestrator.run(&mut page, &sections).await;
    if let Err(e) = page.close().await {
        warn!(error = %e, "Failed to close browser session cleanly");
    }

    let report = CrawlReport {
        generated_at: started.to_rfc3339(),
        cutoff,
        until,
        sections: output.sections,
        posts: output.posts,
    };

    // ---- Output ----
    match json::write_report(&report, &args.json_output_dir, started.naive_local()).await {
        Ok(path) => info!(path = %path.display(), "Report written"),
        Err(e) => error!(error = %e, "Failed to write JSON report"),
    }
    println!("{}", text::posts_to_text(&report.posts));

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        posts = report.posts.len(),
        "Execution complete"
    );

    Ok(())
}
