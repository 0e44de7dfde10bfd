//! Field parsers for telegraph post text.
//!
//! Every function here is pure: it takes the visible text of one candidate
//! element and recovers a single field, returning `None` (or a documented
//! default) when the field is absent. Nothing in this module touches the page.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Validity;

/// Phrases that only appear in the feed's notification toolbar.
pub const NOISE_PHRASES: [&str; 2] = ["桌面通知", "声音提醒"];

/// Cleaned text must be longer than this (in characters) to stand in for a title.
const SYNTHETIC_TITLE_MIN_CHARS: usize = 10;
const SYNTHETIC_TITLE_MAX_CHARS: usize = 50;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"【([^】]+)】").unwrap());

static WEEKDAY_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})[.\-/年](\d{1,2})[.\-/月](\d{1,2})日?\s*(?:星期|周)[一二三四五六日天]")
        .unwrap()
});

static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{4})[.\-/](\d{1,2})[.\-/](\d{1,2})(?:\D|$)").unwrap()
});

static CN_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:(\d{4})年)?(\d{1,2})月(\d{1,2})日").unwrap());

static RELATIVE_DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(今天|昨天|前天)").unwrap());

static SPAN_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,4})[.\-/](\d{1,2})[.\-/](\d{1,4})\s+\d{1,2}:\d{2}").unwrap()
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d:])(\d{1,2}):([0-5]\d)(?::([0-5]\d))?(?:[^\d:]|$)").unwrap()
});

static COMMENT_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"评论\s*[(\[（](\d+)[)\]）]").unwrap());

static COMMENT_COLON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"评论\s*[：:]\s*(\d+)").unwrap());

/// Tokens stripped before a text prefix is used as a synthetic title.
static TITLE_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\d{4}[.\-/年]\d{1,2}[.\-/月]\d{1,2}日?",
        r"|\d{1,2}月\d{1,2}日",
        r"|\d{1,2}:\d{2}(?::\d{2})?",
        r"|(?:星期|周)[一二三四五六日天]",
        r"|评论\s*[(\[（：:]?\s*\d*\s*[)\]）]?",
        r"|\d+\s*阅读|分享|今天|昨天|前天",
    ))
    .unwrap()
});

static STOCK_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\D)(\d{6})\.(SH|SZ|BJ|HK)").unwrap());
static STOCK_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\D)(\d{6})\s*[(（](SH|SZ|BJ|HK)[)）]").unwrap());
static STOCK_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^A-Za-z])(SH|SZ|BJ|HK)(\d{6})(?:\D|$)").unwrap());
static STOCK_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\D)(\d{6})(SH|SZ|BJ|HK)(?:[^A-Za-z]|$)").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Every field recovered from one candidate's text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPost {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub comment_count: u32,
    pub stock_codes: Vec<String>,
    pub validity: Validity,
}

/// Whether the text belongs to page chrome rather than a post.
pub fn is_noise(text: &str) -> bool {
    NOISE_PHRASES.iter().any(|p| text.contains(p))
}

/// Title between `【` and `】`, else a cleaned prefix of the text when enough
/// of it remains after dates, times and counters are removed.
pub fn extract_title(text: &str) -> Option<String> {
    if let Some(caps) = TITLE_RE.captures(text) {
        let title = caps[1].trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }

    let stripped = TITLE_NOISE_RE.replace_all(text, " ");
    let cleaned = WHITESPACE_RE.replace_all(stripped.trim(), " ");
    if cleaned.chars().count() <= SYNTHETIC_TITLE_MIN_CHARS {
        return None;
    }
    Some(
        cleaned
            .chars()
            .take(SYNTHETIC_TITLE_MAX_CHARS)
            .collect::<String>()
            .trim()
            .to_string(),
    )
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Recover the publication date, trying the most specific form first.
///
/// `today` seeds forms without a year and resolves relative words.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(c) = WEEKDAY_DATE_RE.captures(text) {
        if let Some(date) = ymd(&c[1], &c[2], &c[3]) {
            return Some(date);
        }
    }

    if let Some(date) = NUMERIC_DATE_RE
        .captures_iter(text)
        .find_map(|c| ymd(&c[1], &c[2], &c[3]))
    {
        return Some(date);
    }

    if let Some(c) = CN_DATE_RE.captures(text) {
        let year = c
            .get(1)
            .and_then(|y| y.as_str().parse::<i32>().ok())
            .unwrap_or_else(|| today.year());
        let (m, d) = (c[2].parse().ok()?, c[3].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(year, m, d) {
            return Some(date);
        }
    }

    if let Some(c) = RELATIVE_DAY_RE.captures(text) {
        let back = match &c[1] {
            "今天" => 0,
            "昨天" => 1,
            _ => 2,
        };
        return Some(today - Duration::days(back));
    }

    SPAN_DATE_RE.captures(text).and_then(|c| {
        let (a, b, last) = (&c[1], &c[2], &c[3]);
        if a.len() == 4 {
            ymd(a, b, last)
        } else if last.len() == 4 {
            let first: u32 = a.parse().ok()?;
            if first > 12 { ymd(last, b, a) } else { ymd(last, a, b) }
        } else {
            None
        }
    })
}

/// First valid `HH:MM` or `HH:MM:SS` in the text.
pub fn extract_time(text: &str) -> Option<NaiveTime> {
    TIME_RE.captures_iter(text).find_map(|c| {
        let h = c[1].parse().ok()?;
        let m = c[2].parse().ok()?;
        let s = c.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
        NaiveTime::from_hms_opt(h, m, s)
    })
}

/// `评论(N)` and its bracket variants, else `评论: N`. Zero when absent or unparseable.
pub fn extract_comment_count(text: &str) -> u32 {
    COMMENT_PAREN_RE
        .captures(text)
        .or_else(|| COMMENT_COLON_RE.captures(text))
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Exchange-qualified stock codes normalised to `NNNNNN.EX`, in first-seen order.
pub fn extract_stock_codes(text: &str) -> Vec<String> {
    let code_first = [&*STOCK_DOT_RE, &*STOCK_PAREN_RE, &*STOCK_SUFFIX_RE];
    let from_code_first = code_first.into_iter().flat_map(|re| {
        re.captures_iter(text)
            .map(|c| (c.get(1).map_or(0, |m| m.start()), format!("{}.{}", &c[1], c[2].to_uppercase())))
            .collect::<Vec<_>>()
    });
    let from_exchange_first = STOCK_PREFIX_RE
        .captures_iter(text)
        .map(|c| (c.get(1).map_or(0, |m| m.start()), format!("{}.{}", &c[2], c[1].to_uppercase())));

    from_code_first
        .chain(from_exchange_first)
        .sorted_by_key(|(pos, _)| *pos)
        .map(|(_, code)| code)
        .unique()
        .collect()
}

/// Parse every field and classify the candidate.
pub fn parse_post(text: &str, today: NaiveDate) -> ParsedPost {
    let title = extract_title(text);
    let time = extract_time(text);
    let validity = if is_noise(text) {
        Validity::NonPostNoise
    } else if title.is_none() {
        Validity::InvalidNoTitle
    } else if time.is_none() {
        Validity::InvalidNoTimestamp
    } else {
        Validity::Valid
    };

    ParsedPost {
        title,
        date: extract_date(text, today),
        time,
        comment_count: extract_comment_count(text),
        stock_codes: extract_stock_codes(text),
        validity,
    }
}
