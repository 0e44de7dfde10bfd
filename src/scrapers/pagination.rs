//! Section crawl loop: extract, admit, analyze, load more, repeat.
//!
//! Each round extracts posts from the page, admits titles not seen before in
//! this section, fetches and analyzes their comments, then asks the page for
//! more content. The loop ends on the first of:
//!
//! - content older than the cutoff was seen and at least one post was found
//! - three consecutive rounds surfaced no new title
//! - the cap on load-more attempts
//! - three consecutive "load more" attempts changed nothing
//!
//! Posts newer than the window end are skipped but still count as content, so
//! a feed whose head lies after the window keeps paginating towards it. A first
//! round with no valid posts at all abandons the section without paginating.
//!
//! # Load-more cascade
//!
//! 1. Click a visible "load more" button, trying several selector variants
//! 2. Scroll to the bottom of the page
//! 3. Probe in-page pagination functions and more/load-looking elements
//!
//! A tier only counts as successful if the document's scroll height or element
//! count changed afterwards.

use crate::analysis::merge::ResultMerger;
use crate::analysis::{KeywordExtractor, SentimentAnalyzer};
use crate::browser::{Page, PageDriver};
use crate::config::CrawlConfig;
use crate::models::{AnalyzedPost, SectionOutcome};
use crate::scrapers::comments::CommentFetcher;
use crate::scrapers::cutoff::{CutoffFlag, Window};
use crate::scrapers::extractor::PostExtractor;
use crate::utils::random_delay;
use chrono::NaiveDate;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Consecutive empty rounds, or failed load-more attempts, that end a section.
const STALL_LIMIT: usize = 3;

/// "Load more" button variants as `(selector, required text)`, tried in order.
pub const LOAD_MORE_BUTTONS: [(&str, Option<&str>); 6] = [
    ("div.f-s-14.list-more-button.more-button", None),
    (".load-more", None),
    ("[class*='load-more']", None),
    ("button", Some("加载更多")),
    ("a", Some("加载更多")),
    ("[class*='more']", None),
];

const METRICS_SCRIPT: &str = "/* page-metrics */
return [document.body.scrollHeight, document.getElementsByTagName('*').length];";

const SCROLL_SCRIPT: &str = "/* scroll-bottom */
window.scrollTo(0, document.body.scrollHeight);
return null;";

const PROBE_SCRIPT: &str = r#"/* pagination-probe */
for (const name of ['loadMore', 'loadMoreData', 'getMore', 'nextPage']) {
  if (typeof window[name] === 'function') {
    window[name]();
    return true;
  }
}
for (const el of document.querySelectorAll('a, button, div, span')) {
  const text = (el.innerText || '').trim();
  const hint = ((el.className || '') + ' ' + (el.id || '')).toString().toLowerCase();
  if (text === '加载更多' || /more|load/.test(hint)) {
    el.click();
    return true;
  }
}
return false;"#;

/// Per-section bookkeeping. Dropped when the section completes.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Titles admitted so far in this section.
    pub seen_titles: HashSet<String>,
    /// Titles skipped for being newer than the window end.
    pub seen_newer: HashSet<String>,
    /// Rounds in a row that surfaced no title at all.
    pub consecutive_empty_pages: usize,
    /// Load-more attempts in a row that changed nothing.
    pub consecutive_pagination_failures: usize,
    /// Raised once a post older than the cutoff shows up.
    pub cutoff: CutoffFlag,
    /// Extraction rounds run.
    pub rounds: usize,
    /// Load-more attempts made, successful or not.
    pub load_attempts: usize,
}

/// What one section crawl produced.
#[derive(Debug)]
pub struct SectionRun {
    /// Analyzed posts in discovery order.
    pub posts: Vec<AnalyzedPost>,
    /// Why the crawl stopped.
    pub outcome: SectionOutcome,
    /// Extraction rounds run.
    pub rounds: usize,
}

/// Document size snapshot used to tell whether a load attempt did anything.
type PageMetrics = (u64, u64);

/// Drives one section from its first page to a terminal state.
#[derive(Debug)]
pub struct SectionCrawler<'a, S, K> {
    /// Section label, stamped on every post.
    section: String,
    extractor: PostExtractor,
    comments: CommentFetcher,
    /// Shared analysis stage.
    merger: &'a ResultMerger<S, K>,
    /// Load-more attempts allowed before the section stops with `RoundCap`.
    max_load_more: usize,
    /// Bounds of the random pause between rounds.
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl<'a, S, K> SectionCrawler<'a, S, K>
where
    S: SentimentAnalyzer,
    K: KeywordExtractor,
{
    /// Build a crawler for one section from the shared crawl settings.
    pub fn new(
        section: &str,
        window: Window,
        today: NaiveDate,
        config: &CrawlConfig,
        merger: &'a ResultMerger<S, K>,
    ) -> Self {
        Self {
            section: section.to_string(),
            extractor: PostExtractor::new(window, section, today, config.min_candidate_chars),
            comments: CommentFetcher::new(config.max_comments),
            merger,
            max_load_more: config.max_load_more,
            delay_min_ms: config.delay_min_ms,
            delay_max_ms: config.delay_max_ms,
        }
    }

    /// Crawl the section currently displayed in `page`.
    ///
    /// # Returns
    ///
    /// Analyzed posts in discovery order and the reason the crawl stopped.
    #[instrument(level = "info", skip_all, fields(section = %self.section))]
    pub async fn run<D: PageDriver>(&self, page: &mut Page<D>) -> SectionRun {
        let mut state = CrawlState::default();
        let mut posts = Vec::new();

        let outcome = loop {
            state.rounds += 1;
            let extraction = self.extractor.extract(page).await;

            if state.rounds == 1 && extraction.posts.is_empty() && extraction.too_new.is_empty() {
                warn!("No posts on the first page; abandoning section");
                break SectionOutcome::Abandoned;
            }

            let newer = extraction
                .too_new
                .into_iter()
                .filter(|title| state.seen_newer.insert(title.clone()))
                .count();

            let mut admitted = 0usize;
            for post in extraction.posts {
                if !state.seen_titles.insert(post.title.clone()) {
                    continue;
                }
                admitted += 1;
                match self.comments.fetch(page, &post).await {
                    Ok(comments) => posts.push(self.merger.merge(&post, comments).await),
                    Err(e) => {
                        warn!(title = %post.title, error = %e, "Dropping post after browser failure")
                    }
                }
            }
            if extraction.reached_cutoff {
                state.cutoff.raise();
            }

            if admitted == 0 && newer == 0 {
                state.consecutive_empty_pages += 1;
            } else {
                state.consecutive_empty_pages = 0;
            }
            info!(
                round = state.rounds,
                admitted,
                newer,
                total = posts.len(),
                reached_cutoff = state.cutoff.is_raised(),
                "Round complete"
            );

            if state.cutoff.is_raised() && !state.seen_titles.is_empty() {
                break SectionOutcome::CutoffReached;
            }
            if state.consecutive_empty_pages >= STALL_LIMIT {
                break SectionOutcome::Exhausted;
            }
            if state.load_attempts >= self.max_load_more {
                break SectionOutcome::RoundCap;
            }

            sleep(random_delay(self.delay_min_ms, self.delay_max_ms)).await;

            state.load_attempts += 1;
            if self.load_more(page).await {
                state.consecutive_pagination_failures = 0;
            } else {
                state.consecutive_pagination_failures += 1;
                if state.consecutive_pagination_failures >= STALL_LIMIT {
                    break SectionOutcome::NoMoreContent;
                }
            }
        };

        info!(
            ?outcome,
            rounds = state.rounds,
            load_attempts = state.load_attempts,
            posts = posts.len(),
            "Section finished"
        );
        SectionRun {
            posts,
            outcome,
            rounds: state.rounds,
        }
    }

    async fn metrics<D: PageDriver>(&self, page: &mut Page<D>) -> Option<PageMetrics> {
        let value = match page.evaluate(METRICS_SCRIPT).await {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Could not read page metrics");
                return None;
            }
        };
        let pair = value.as_array()?;
        Some((pair.first()?.as_u64()?, pair.get(1)?.as_u64()?))
    }

    async fn changed<D: PageDriver>(&self, page: &mut Page<D>, before: Option<PageMetrics>) -> bool {
        let after = self.metrics(page).await;
        matches!((before, after), (Some(b), Some(a)) if a != b)
    }

    async fn click_load_more_button<D: PageDriver>(&self, page: &mut Page<D>) -> bool {
        for (selector, required_text) in LOAD_MORE_BUTTONS {
            let Ok(handles) = page.query_all(selector).await else {
                continue;
            };
            for handle in handles {
                if let Some(wanted) = required_text {
                    match page.text(&handle).await {
                        Ok(text) if text.trim() == wanted => {}
                        _ => continue,
                    }
                }
                if !page.is_visible(&handle).await.unwrap_or(false) {
                    continue;
                }
                if let Err(e) = page.scroll_into_view(&handle).await {
                    debug!(selector, error = %e, "Could not scroll button into view");
                }

                let before = self.metrics(page).await;
                if let Err(e) = page.click(&handle).await {
                    debug!(selector, error = %e, "Load-more click failed");
                    break;
                }
                if self.changed(page, before).await {
                    info!(selector, "Loaded more posts via button");
                    return true;
                }
                // The click started a new page view; remaining handles are stale.
                break;
            }
        }
        false
    }

    async fn run_load_script<D: PageDriver>(&self, page: &mut Page<D>, script: &str, tier: &str) -> bool {
        let before = self.metrics(page).await;
        if let Err(e) = page.run_script(script).await {
            debug!(tier, error = %e, "Load-more script failed");
            return false;
        }
        let loaded = self.changed(page, before).await;
        if loaded {
            info!(tier, "Loaded more posts via script");
        }
        loaded
    }

    /// Try each load-more tier until one changes the page.
    pub async fn load_more<D: PageDriver>(&self, page: &mut Page<D>) -> bool {
        if self.click_load_more_button(page).await {
            return true;
        }
        if self.run_load_script(page, SCROLL_SCRIPT, "scroll").await {
            return true;
        }
        if self.run_load_script(page, PROBE_SCRIPT, "probe").await {
            return true;
        }
        info!("No load-more tier produced new content");
        false
    }
}
