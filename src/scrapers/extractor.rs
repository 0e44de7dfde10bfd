//! Post extraction from the currently displayed feed page.
//!
//! Candidates are gathered by an ordered cascade of [`ScanStrategy`] values.
//! The first strategy that yields any candidate wins and later strategies are
//! not consulted, so results from different DOM dialects are never mixed. The
//! last strategy is an in-page heuristic scan that works without any known
//! selector but produces candidates with no element handle.
//!
//! Each candidate is parsed, classified, and checked against the time window
//! in the same pass.

use crate::browser::{Handle, Page, PageDriver};
use crate::models::{PostRecord, Validity};
use crate::scrapers::cutoff::{Placement, Window};
use crate::scrapers::parse::{is_noise, parse_post};
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Feed item selectors, most specific first.
pub const POST_SELECTORS: [&str; 7] = [
    ".b-c-e6e7ea.telegraph-list",
    ".telegraph-item",
    "div.box",
    "div.red-box",
    "[class*='telegraph']",
    "[class*='post']",
    "[class*='item']",
];

/// Whole-page scan for elements that look like posts: text with a title bracket
/// or a clock time, a box of at least 100x20 px, and under 600 characters.
const HEURISTIC_SCAN_SCRIPT: &str = r#"/* post-scan */
const found = [];
const seen = new Set();
for (const el of document.querySelectorAll('body *')) {
  const text = (el.innerText || '').trim();
  if (!text || text.length >= 600 || seen.has(text)) continue;
  if (!(text.includes('【') || /\d{1,2}:\d{2}/.test(text))) continue;
  const rect = el.getBoundingClientRect();
  if (rect.width < 100 || rect.height < 20) continue;
  seen.add(text);
  found.push(text);
}
return found;"#;

/// One way of finding post candidates on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    Selector(&'static str),
    HeuristicScript,
}

impl ScanStrategy {
    /// The full cascade in the order it is tried.
    pub fn cascade() -> Vec<ScanStrategy> {
        POST_SELECTORS
            .iter()
            .map(|s| ScanStrategy::Selector(*s))
            .chain(std::iter::once(ScanStrategy::HeuristicScript))
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanStrategy::Selector(s) => *s,
            ScanStrategy::HeuristicScript => "heuristic-scan",
        }
    }
}

/// Text of one element that might be a post.
#[derive(Debug, Clone)]
pub struct Candidate<E> {
    pub handle: Option<Handle<E>>,
    pub origin: Option<&'static str>,
    pub text: String,
}

/// What one extraction pass produced.
#[derive(Debug)]
pub struct Extraction<E> {
    pub posts: Vec<PostRecord<E>>,
    /// A valid post older than the cutoff was seen in this pass.
    pub reached_cutoff: bool,
    /// Titles of valid posts newer than the window end. Skipped, but proof the
    /// page has content.
    pub too_new: Vec<String>,
    /// Label of the strategy that produced the candidates.
    pub strategy: Option<&'static str>,
    /// Raw candidate count before parsing.
    pub candidates: usize,
}

/// Extracts posts for one section from whatever page is displayed.
#[derive(Debug, Clone)]
pub struct PostExtractor {
    window: Window,
    section: String,
    today: NaiveDate,
    min_chars: usize,
}

impl PostExtractor {
    pub fn new(window: Window, section: &str, today: NaiveDate, min_chars: usize) -> Self {
        Self {
            window,
            section: section.to_string(),
            today,
            min_chars,
        }
    }

    fn long_enough(&self, text: &str) -> bool {
        text.chars().count() >= self.min_chars
    }

    async fn scan<D: PageDriver>(
        &self,
        page: &mut Page<D>,
        strategy: ScanStrategy,
    ) -> Vec<Candidate<D::Element>> {
        match strategy {
            ScanStrategy::Selector(selector) => {
                let handles = match page.query_all(selector).await {
                    Ok(h) => h,
                    Err(e) => {
                        debug!(selector, error = %e, "Selector query failed");
                        return Vec::new();
                    }
                };
                let mut found = Vec::new();
                for handle in handles {
                    let text = match page.text(&handle).await {
                        Ok(t) => t.trim().to_string(),
                        Err(e) => {
                            debug!(selector, error = %e, "Could not read candidate text");
                            continue;
                        }
                    };
                    if !self.long_enough(&text) || is_noise(&text) {
                        continue;
                    }
                    found.push(Candidate {
                        handle: Some(handle),
                        origin: Some(selector),
                        text,
                    });
                }
                found
            }
            ScanStrategy::HeuristicScript => match page.evaluate(HEURISTIC_SCAN_SCRIPT).await {
                Ok(value) => value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(|t| t.trim().to_string())
                            .filter(|t| self.long_enough(t))
                            .map(|text| Candidate {
                                handle: None,
                                origin: None,
                                text,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "Heuristic post scan failed");
                    Vec::new()
                }
            },
        }
    }

    /// Run the scan cascade and turn the winning candidates into posts.
    ///
    /// # Returns
    ///
    /// Valid, in-window posts deduplicated by title, plus whether any valid post
    /// older than the cutoff was seen. Posts whose date cannot be recovered are
    /// kept.
    #[instrument(level = "info", skip_all, fields(section = %self.section))]
    pub async fn extract<D: PageDriver>(&self, page: &mut Page<D>) -> Extraction<D::Element> {
        let mut candidates = Vec::new();
        let mut strategy = None;
        for tier in ScanStrategy::cascade() {
            candidates = self.scan(page, tier).await;
            if !candidates.is_empty() {
                strategy = Some(tier.label());
                break;
            }
        }

        let candidate_count = candidates.len();
        let mut titles = HashSet::new();
        let mut posts = Vec::new();
        let mut reached_cutoff = false;
        let mut too_new = Vec::new();

        for candidate in candidates {
            let parsed = parse_post(&candidate.text, self.today);
            if parsed.validity != Validity::Valid {
                debug!(
                    validity = ?parsed.validity,
                    text = %truncate_for_log(&candidate.text, 120),
                    "Skipping candidate"
                );
                continue;
            }
            let Some(title) = parsed.title else {
                continue;
            };
            if !titles.insert(title.clone()) {
                continue;
            }

            let post = PostRecord {
                title,
                date: parsed.date,
                time: parsed.time,
                comment_count: parsed.comment_count,
                section: self.section.clone(),
                validity: parsed.validity,
                stock_codes: parsed.stock_codes,
                source: candidate.handle,
                origin: candidate.origin,
            };

            match self.window.place(post.timestamp()) {
                Placement::InWindow => posts.push(post),
                Placement::BeforeCutoff => {
                    debug!(title = %post.title, "Post precedes cutoff");
                    reached_cutoff = true;
                }
                Placement::TooNew => {
                    debug!(title = %post.title, "Post is newer than the window end");
                    too_new.push(post.title);
                }
                Placement::Unknown => {
                    warn!(title = %post.title, "Post date not recognised; keeping it");
                    posts.push(post);
                }
            }
        }

        info!(
            strategy = strategy.unwrap_or("none"),
            candidates = candidate_count,
            posts = posts.len(),
            too_new = too_new.len(),
            reached_cutoff,
            "Extracted posts"
        );
        Extraction {
            posts,
            reached_cutoff,
            too_new,
            strategy,
            candidates: candidate_count,
        }
    }
}
