//! Comment collection for a single post.
//!
//! Opening a post's comments navigates away from the feed, so this module owns
//! the round trip: find the post's comment trigger, click it, read whatever
//! comment texts the opened view shows, and step back to the feed.
//!
//! The element recorded at extraction time may belong to an earlier page view
//! (an earlier post's comment detour already went back and forth). In that case
//! the post is located again under its original selector by title.

use crate::browser::{DriverResult, Handle, Page, PageDriver};
use crate::models::PostRecord;
use crate::scrapers::parse::extract_title;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

/// Selectors for the element that opens a post's comments, tried in order.
pub const TRIGGER_SELECTORS: [&str; 7] = [
    "span.comment",
    "div.comment",
    ".comment",
    "[class*='comment']",
    "span[class*='comment']",
    "div[class*='comment']",
    ".comments-count",
];

/// Selectors for comment bodies in the opened view, tried in order.
pub const CONTENT_SELECTORS: [&str; 8] = [
    ".comment-item",
    ".comment-content",
    ".comment-text",
    "[class*='comment-item']",
    "[class*='comment-content']",
    "[class*='comment-text']",
    ".comment-body",
    ".comment p",
];

/// Texts at or under this many characters are UI artifacts.
const MIN_COMMENT_CHARS: usize = 2;

static BARE_TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?$").unwrap());

/// Whether a collected text is a real comment rather than a label or timestamp.
pub fn is_comment_text(text: &str) -> bool {
    text.chars().count() > MIN_COMMENT_CHARS && !BARE_TIMESTAMP_RE.is_match(text)
}

/// Fetches comments, capped at `max_comments` per post.
#[derive(Debug, Clone, Copy)]
pub struct CommentFetcher {
    max_comments: usize,
}

impl CommentFetcher {
    pub fn new(max_comments: usize) -> Self {
        Self { max_comments }
    }

    /// A handle for `post` that is valid in the current page view, if the post
    /// is still on the page.
    async fn fresh_handle<D: PageDriver>(
        &self,
        page: &Page<D>,
        post: &PostRecord<D::Element>,
    ) -> DriverResult<Option<Handle<D::Element>>> {
        let Some(source) = &post.source else {
            return Ok(None);
        };
        if page.is_current(source) {
            return Ok(Some(source.clone()));
        }
        let Some(origin) = post.origin else {
            return Ok(None);
        };

        debug!(
            title = %post.title,
            origin,
            captured_view = source.view(),
            current_view = page.view(),
            "Relocating post in current page view"
        );
        for handle in page.query_all(origin).await? {
            let Ok(text) = page.text(&handle).await else {
                continue;
            };
            if extract_title(&text).as_deref() == Some(post.title.as_str()) {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    async fn find_trigger<D: PageDriver>(
        &self,
        page: &Page<D>,
        post: &Handle<D::Element>,
    ) -> DriverResult<Option<Handle<D::Element>>> {
        for selector in TRIGGER_SELECTORS {
            if let Some(trigger) = page.query_within(post, selector).await?.into_iter().next() {
                debug!(selector, "Found comment trigger");
                return Ok(Some(trigger));
            }
        }
        Ok(None)
    }

    async fn collect<D: PageDriver>(&self, page: &Page<D>) -> Vec<String> {
        for selector in CONTENT_SELECTORS {
            let Ok(found) = page.query_all(selector).await else {
                continue;
            };
            if found.is_empty() {
                continue;
            }
            let mut comments = Vec::new();
            for handle in found {
                if comments.len() >= self.max_comments {
                    break;
                }
                match page.text(&handle).await {
                    Ok(text) => {
                        let text = text.trim();
                        if is_comment_text(text) {
                            comments.push(text.to_string());
                        }
                    }
                    Err(e) => debug!(selector, error = %e, "Could not read comment text"),
                }
            }
            if !comments.is_empty() {
                info!(selector, count = comments.len(), "Collected comments");
                return comments;
            }
        }
        Vec::new()
    }

    /// Collect comment texts for `post`.
    ///
    /// Posts with a zero comment count, or without a page element, return an
    /// empty list without touching the browser. Once the trigger has been
    /// clicked, the browser is always sent back to the previous page before
    /// returning. A failed click only goes back if it changed the URL.
    ///
    /// # Returns
    ///
    /// Up to `max_comments` comment texts, or an error if the page could not be
    /// queried or restored.
    #[instrument(level = "info", skip_all, fields(title = %post.title, comment_count = post.comment_count))]
    pub async fn fetch<D: PageDriver>(
        &self,
        page: &mut Page<D>,
        post: &PostRecord<D::Element>,
    ) -> DriverResult<Vec<String>> {
        if post.comment_count == 0 {
            return Ok(Vec::new());
        }
        let Some(handle) = self.fresh_handle(page, post).await? else {
            debug!("No page element for post; skipping comments");
            return Ok(Vec::new());
        };
        let Some(trigger) = self.find_trigger(page, &handle).await? else {
            let markup = page.html(&handle).await.unwrap_or_default();
            info!(markup = %truncate_for_log(&markup, 300), "No comment trigger found");
            return Ok(Vec::new());
        };

        let before = page.current_url().await?;
        if let Err(e) = page.click(&trigger).await {
            warn!(error = %e, "Comment trigger click failed");
            if page.current_url().await? != before {
                page.go_back().await?;
            }
            return Ok(Vec::new());
        }

        let comments = self.collect(page).await;
        page.go_back().await?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockDriver, MockElement};
    use crate::models::Validity;
    use crate::scrapers::parse::extract_comment_count;
    use std::time::Duration;

    const FEED: &str = "https://feed.test/telegraph";

    fn feed_html() -> String {
        r#"
        <div class="telegraph-item">【第一条快讯标题】2025.04.11 10:15:12
            <span class="comment" data-goto="https://feed.test/c/1">评论(2)</span></div>
        <div class="telegraph-item">【第二条快讯标题】2025.04.11 10:10:00
            <span class="comment" data-goto="https://feed.test/c/2">评论(1)</span></div>
        <div class="telegraph-item">【第三条快讯标题】2025.04.11 10:05:00
            <span class="comment" data-goto="https://feed.test/c/3" data-fail-click>评论(1)</span></div>
        "#
        .to_string()
    }

    fn driver() -> MockDriver {
        MockDriver::new()
            .with_page(FEED, &feed_html())
            .with_page(
                "https://feed.test/c/1",
                r#"<div class="comment-item">利好消息，看好后市</div>
                   <div class="comment-item">14:30</div>
                   <div class="comment-item">好</div>
                   <div class="comment-item">跌麻了，被套</div>"#,
            )
            .with_page(
                "https://feed.test/c/2",
                r#"<div class="comment-content">14:30</div>"#,
            )
    }

    async fn feed_posts(
        page: &mut Page<MockDriver>,
    ) -> Vec<PostRecord<MockElement>> {
        page.goto(FEED).await.unwrap();
        let mut posts = Vec::new();
        for handle in page.query_all(".telegraph-item").await.unwrap() {
            let text = page.text(&handle).await.unwrap();
            posts.push(PostRecord {
                title: extract_title(&text).unwrap(),
                date: None,
                time: None,
                comment_count: extract_comment_count(&text),
                section: "公司".to_string(),
                validity: Validity::Valid,
                stock_codes: vec![],
                source: Some(handle),
                origin: Some(".telegraph-item"),
            });
        }
        posts
    }

    fn page() -> Page<MockDriver> {
        Page::new(driver(), Duration::ZERO, Duration::from_secs(1))
    }

    #[test]
    fn test_comment_text_filter() {
        assert!(is_comment_text("利好消息"));
        assert!(!is_comment_text("14:30"));
        assert!(!is_comment_text("9:05:01"));
        assert!(!is_comment_text("好的"));
    }

    #[tokio::test]
    async fn test_collects_filtered_comments_and_returns() {
        let mut page = page();
        let posts = feed_posts(&mut page).await;
        let comments = CommentFetcher::new(50).fetch(&mut page, &posts[0]).await.unwrap();

        assert_eq!(comments, vec!["利好消息，看好后市", "跌麻了，被套"]);
        assert_eq!(page.current_url().await.unwrap(), FEED);
        assert_eq!(page.driver().count_actions("back"), 1);
    }

    #[tokio::test]
    async fn test_zero_count_never_navigates() {
        let mut page = page();
        let mut posts = feed_posts(&mut page).await;
        posts[0].comment_count = 0;
        let before = page.driver().actions().len();

        let comments = CommentFetcher::new(50).fetch(&mut page, &posts[0]).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(page.driver().actions().len(), before);
    }

    #[tokio::test]
    async fn test_handleless_post_is_skipped() {
        let mut page = page();
        let mut posts = feed_posts(&mut page).await;
        posts[0].source = None;
        posts[0].origin = None;

        let comments = CommentFetcher::new(50).fetch(&mut page, &posts[0]).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(page.driver().count_actions("click"), 0);
    }

    #[tokio::test]
    async fn test_timestamp_only_comment_section_is_empty() {
        let mut page = page();
        let posts = feed_posts(&mut page).await;
        let comments = CommentFetcher::new(50).fetch(&mut page, &posts[1]).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(page.driver().count_actions("back"), 1);
    }

    #[tokio::test]
    async fn test_stale_handle_is_relocated_by_title() {
        let mut page = page();
        let posts = feed_posts(&mut page).await;
        let fetcher = CommentFetcher::new(50);

        fetcher.fetch(&mut page, &posts[0]).await.unwrap();
        assert!(!page.is_current(posts[1].source.as_ref().unwrap()));

        let comments = fetcher.fetch(&mut page, &posts[1]).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(page.driver().count_actions("click"), 2);
        assert_eq!(page.driver().count_actions("back"), 2);
        assert_eq!(page.current_url().await.unwrap(), FEED);
    }

    #[tokio::test]
    async fn test_failed_click_stays_on_feed() {
        let mut page = page();
        let posts = feed_posts(&mut page).await;
        let comments = CommentFetcher::new(50).fetch(&mut page, &posts[2]).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(page.driver().count_actions("back"), 0);
        assert_eq!(page.current_url().await.unwrap(), FEED);
    }

    #[tokio::test]
    async fn test_comment_cap() {
        let mut page = page();
        let posts = feed_posts(&mut page).await;
        let comments = CommentFetcher::new(1).fetch(&mut page, &posts[0]).await.unwrap();
        assert_eq!(comments, vec!["利好消息，看好后市"]);
    }
}
