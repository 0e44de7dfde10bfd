//! Data models for crawled posts and their analyzed representations.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Section`]: A named feed category to crawl
//! - [`PostRecord`]: A post as parsed from the page, still tied to its page view
//! - [`SentimentResult`]: Output of a sentiment backend
//! - [`AnalyzedPost`]: A post with its comments and analysis, ready for output
//! - [`CrawlReport`]: Everything one run produced

use crate::browser::Handle;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A named content category within the telegraph feed.
///
/// `label` is the visible tab text (for example `看盘` or `公司`). `slug` is the
/// URL path segment used for direct navigation; when absent the percent-encoded
/// label is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Section {
    pub label: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl Section {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            slug: None,
        }
    }

    pub fn slug(&self) -> String {
        match &self.slug {
            Some(slug) => slug.clone(),
            None => urlencoding::encode(&self.label).into_owned(),
        }
    }
}

/// Outcome of classifying one candidate. Only `Valid` records reach the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    InvalidNoTimestamp,
    InvalidNoTitle,
    NonPostNoise,
}

/// A post parsed from the current page.
///
/// `source` is the element the post was read from and is only usable while the
/// page view that produced it is still displayed. `origin` names the selector
/// that found it, so the element can be located again after the view changes.
/// Posts found by the whole-page heuristic scan carry neither.
#[derive(Debug, Clone)]
pub struct PostRecord<E> {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub comment_count: u32,
    pub section: String,
    pub validity: Validity,
    pub stock_codes: Vec<String>,
    pub source: Option<Handle<E>>,
    pub origin: Option<&'static str>,
}

impl<E> PostRecord<E> {
    /// Combined publication instant, when both parts were recovered.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }
}

/// Five-step sentiment scale shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SentimentLabel {
    #[serde(rename = "极度消极")]
    VeryNegative,
    #[serde(rename = "消极")]
    Negative,
    #[serde(rename = "中性")]
    Neutral,
    #[serde(rename = "积极")]
    Positive,
    #[serde(rename = "极度积极")]
    VeryPositive,
}

impl SentimentLabel {
    /// Map a 1-5 score onto the scale. Out-of-range scores clamp to the ends.
    pub fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => SentimentLabel::VeryNegative,
            2 => SentimentLabel::Negative,
            3 => SentimentLabel::Neutral,
            4 => SentimentLabel::Positive,
            _ => SentimentLabel::VeryPositive,
        }
    }

    pub fn score(self) -> u8 {
        match self {
            SentimentLabel::VeryNegative => 1,
            SentimentLabel::Negative => 2,
            SentimentLabel::Neutral => 3,
            SentimentLabel::Positive => 4,
            SentimentLabel::VeryPositive => 5,
        }
    }

    /// Parse the display text used by the site's readers and by the LLM template.
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim() {
            "极度消极" => Some(SentimentLabel::VeryNegative),
            "消极" => Some(SentimentLabel::Negative),
            "中性" => Some(SentimentLabel::Neutral),
            "积极" => Some(SentimentLabel::Positive),
            "极度积极" => Some(SentimentLabel::VeryPositive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::VeryNegative => "极度消极",
            SentimentLabel::Negative => "消极",
            SentimentLabel::Neutral => "中性",
            SentimentLabel::Positive => "积极",
            SentimentLabel::VeryPositive => "极度积极",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Share of positive, neutral and negative comments, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Distribution {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "积极 {:.0}% | 中性 {:.0}% | 消极 {:.0}%",
            self.positive, self.neutral, self.negative
        )
    }
}

/// What a sentiment backend reports for one post's comments.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: Option<u8>,
    pub distribution: Option<Distribution>,
    /// Comments the backend considered representative, if it reports any.
    pub key_comments: Vec<String>,
}

impl SentimentResult {
    /// The outcome for a post without comments or with a failed analysis.
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: None,
            distribution: None,
            key_comments: Vec::new(),
        }
    }
}

fn dotted_date<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => s.serialize_str(&d.format("%Y.%m.%d").to_string()),
        None => s.serialize_none(),
    }
}

/// A post with its comments and analysis attached. Immutable once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedPost {
    pub title: String,
    #[serde(serialize_with = "dotted_date")]
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub section: String,
    pub comment_count: u32,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: Option<u8>,
    pub sentiment_distribution: Option<Distribution>,
    pub keywords: Vec<String>,
    pub key_comments: Vec<String>,
    pub comments: Vec<String>,
    pub stock_codes: Vec<String>,
}

impl AnalyzedPost {
    /// `YYYY.MM.DD`, or `未知` when the date could not be recovered.
    pub fn display_date(&self) -> String {
        self.date
            .map(|d| d.format("%Y.%m.%d").to_string())
            .unwrap_or_else(|| "未知".to_string())
    }

    pub fn display_time(&self) -> String {
        self.time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "未知".to_string())
    }
}

/// How a section crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionOutcome {
    /// Content older than the cutoff was observed after at least one post.
    CutoffReached,
    /// Three consecutive rounds surfaced no new title.
    Exhausted,
    /// Three consecutive "load more" attempts changed nothing.
    NoMoreContent,
    /// The configured cap on load-more attempts was hit.
    RoundCap,
    /// The first extraction found nothing, so pagination was never attempted.
    Abandoned,
}

/// Per-section line in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct SectionSummary {
    pub label: String,
    pub navigated: bool,
    pub outcome: Option<SectionOutcome>,
    pub posts: usize,
}

/// Everything a run produced, in crawl order.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub generated_at: String,
    pub cutoff: NaiveDateTime,
    pub until: Option<NaiveDateTime>,
    pub sections: Vec<SectionSummary>,
    pub posts: Vec<AnalyzedPost>,
}
