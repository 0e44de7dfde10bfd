//! Navigation to a section tab of the telegraph feed.
//!
//! Getting to a section takes two stages: reach the feed itself, then select
//! the section's tab. Each stage tries three tiers and stops at the first that
//! works:
//!
//! | Stage | Tier 1 | Tier 2 | Tier 3 |
//! |-------|--------|--------|--------|
//! | Feed  | Direct URL, checked by path | Top-band nav link on the home page | In-page anchor click |
//! | Tab   | Direct URL, checked by path or active tab | Visible tab link | In-page anchor click |

use crate::browser::{Page, PageDriver};
use crate::config::CrawlConfig;
use crate::models::Section;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where the top navigation link to the feed may live, most specific first.
pub const PARENT_LINK_SELECTORS: [&str; 6] = [
    "header a",
    "nav a",
    ".header a",
    ".nav a",
    "a.nav-item",
    "a",
];

/// Where section tabs may live, most specific first.
pub const TAB_SELECTORS: [&str; 6] = [
    ".sub-nav a",
    "nav.secondary-nav a",
    ".tabs a",
    "[role='tablist'] a",
    "a.tab",
    "a",
];

/// Markers of the currently selected tab.
pub const ACTIVE_TAB_SELECTORS: [&str; 4] = [
    "[role='tab'][aria-selected='true']",
    ".tab.active",
    ".active",
    ".selected-tab",
];

/// In-page script that clicks the first anchor or tab whose text is exactly
/// `label`.
fn anchor_click_script(label: &str) -> String {
    // serde_json string output is a valid JS string literal.
    let literal = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"/* anchor-click */
const label = {literal};
for (const el of document.querySelectorAll('a, [role="tab"], .tab')) {{
  if ((el.innerText || '').trim() === label) {{
    el.click();
    return true;
  }}
}}
return false;"#
    )
}

/// Whether `current` points at a path starting with `path`.
fn path_starts_with(current: &str, path: &str) -> bool {
    Url::parse(current)
        .map(|u| u.path().starts_with(path))
        .unwrap_or(false)
}

/// Whether `current` names the section in its path, encoded or not.
fn path_names_section(current: &str, section: &Section) -> bool {
    let Ok(url) = Url::parse(current) else {
        return false;
    };
    let path = url.path();
    if path.contains(&section.slug()) {
        return true;
    }
    urlencoding::decode(path)
        .map(|decoded| decoded.contains(&section.label))
        .unwrap_or(false)
}

/// Drives the browser to a requested section.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    config: &'a CrawlConfig,
}

impl<'a> Navigator<'a> {
    pub fn new(config: &'a CrawlConfig) -> Self {
        Self { config }
    }

    async fn on_feed<D: PageDriver>(&self, page: &Page<D>) -> bool {
        match page.current_url().await {
            Ok(url) => path_starts_with(&url, &self.config.parent_path),
            Err(e) => {
                debug!(error = %e, "Could not read current URL");
                false
            }
        }
    }

    async fn feed_by_url<D: PageDriver>(&self, page: &mut Page<D>) -> bool {
        let url = self.config.parent_url();
        if let Err(e) = page.goto(&url).await {
            warn!(%url, error = %e, "Direct feed navigation failed");
            return false;
        }
        self.on_feed(page).await
    }

    async fn feed_by_nav_link<D: PageDriver>(&self, page: &mut Page<D>) -> bool {
        if let Err(e) = page.goto(&self.config.base_url).await {
            warn!(error = %e, "Could not load home page");
            return false;
        }
        let label = self.config.parent_label.as_str();
        for selector in PARENT_LINK_SELECTORS {
            let Ok(links) = page.query_all(selector).await else {
                continue;
            };
            for link in links {
                if !matches!(page.text(&link).await, Ok(t) if t.trim() == label) {
                    continue;
                }
                let top = page.top(&link).await.unwrap_or(f64::MAX);
                if top >= self.config.top_band_px {
                    debug!(selector, top, "Skipping link outside the top band");
                    continue;
                }
                info!(selector, top, "Clicking feed link");
                if let Err(e) = page.click(&link).await {
                    warn!(selector, error = %e, "Feed link click failed");
                    return false;
                }
                return self.on_feed(page).await;
            }
        }
        false
    }

    async fn click_by_script<D: PageDriver>(&self, page: &mut Page<D>, label: &str) -> bool {
        match page.run_script(&anchor_click_script(label)).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                warn!(label, error = %e, "Anchor click script failed");
                false
            }
        }
    }

    /// Stage one: get onto the telegraph feed.
    #[instrument(level = "info", skip_all)]
    pub async fn reach_feed<D: PageDriver>(&self, page: &mut Page<D>) -> bool {
        if self.feed_by_url(page).await {
            info!(tier = "direct-url", "Reached feed");
            return true;
        }
        if self.feed_by_nav_link(page).await {
            info!(tier = "nav-link", "Reached feed");
            return true;
        }
        if self.click_by_script(page, &self.config.parent_label).await && self.on_feed(page).await {
            info!(tier = "anchor-script", "Reached feed");
            return true;
        }
        false
    }

    async fn tab_is_active<D: PageDriver>(&self, page: &Page<D>, label: &str) -> bool {
        for selector in ACTIVE_TAB_SELECTORS {
            let Ok(found) = page.query_all(selector).await else {
                continue;
            };
            for handle in found {
                if matches!(page.text(&handle).await, Ok(t) if t.trim() == label) {
                    return true;
                }
            }
        }
        false
    }

    async fn tab_by_url<D: PageDriver>(&self, page: &mut Page<D>, section: &Section) -> bool {
        let url = self.config.section_url(section);
        if let Err(e) = page.goto(&url).await {
            warn!(%url, error = %e, "Direct section navigation failed");
            return false;
        }
        match page.current_url().await {
            Ok(current) if path_names_section(&current, section) => true,
            _ => self.tab_is_active(page, &section.label).await,
        }
    }

    async fn tab_by_click<D: PageDriver>(&self, page: &mut Page<D>, label: &str) -> bool {
        for selector in TAB_SELECTORS {
            let Ok(tabs) = page.query_all(selector).await else {
                continue;
            };
            for tab in tabs {
                if !matches!(page.text(&tab).await, Ok(t) if t.trim() == label) {
                    continue;
                }
                if !page.is_visible(&tab).await.unwrap_or(false) {
                    continue;
                }
                info!(selector, "Clicking section tab");
                return match page.click(&tab).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(selector, error = %e, "Section tab click failed");
                        false
                    }
                };
            }
        }
        false
    }

    /// Stage two: select the section's tab. Assumes the feed is displayed.
    #[instrument(level = "info", skip_all, fields(section = %section.label))]
    pub async fn open_tab<D: PageDriver>(&self, page: &mut Page<D>, section: &Section) -> bool {
        if self.tab_by_url(page, section).await {
            info!(tier = "direct-url", "Opened section");
            return true;
        }
        // The failed direct attempt may have left the feed.
        if !self.on_feed(page).await && !self.feed_by_url(page).await {
            debug!("Could not return to feed before clicking tabs");
        }
        if self.tab_by_click(page, &section.label).await {
            info!(tier = "tab-click", "Opened section");
            return true;
        }
        if self.click_by_script(page, &section.label).await {
            info!(tier = "anchor-script", "Opened section");
            return true;
        }
        false
    }

    /// Both stages.
    ///
    /// # Returns
    ///
    /// `true` when the section's content is displayed, `false` when every tier
    /// of either stage failed.
    pub async fn navigate_to_section<D: PageDriver>(&self, page: &mut Page<D>, section: &Section) -> bool {
        if !self.reach_feed(page).await {
            warn!(section = %section.label, "Could not reach the telegraph feed");
            return false;
        }
        let opened = self.open_tab(page, section).await;
        if !opened {
            warn!(section = %section.label, "Could not open section tab");
        }
        opened
    }
}
