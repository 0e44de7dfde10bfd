//! In-memory [`PageDriver`] for tests.
//!
//! Pages are plain HTML strings keyed by URL and parsed with `scraper` on every
//! query. A handful of data attributes stand in for client-side behaviour:
//!
//! - `data-goto="url"`: clicking navigates to `url`
//! - `data-load-more`: clicking appends the next queued fragment
//! - `data-fail-click`: clicking returns an error
//! - `data-top="n"`: bounding-box top in pixels (default 0)
//! - `hidden`: element is not visible
//!
//! Scripts are identified by a leading `/* tag */` comment. Tags with built-in
//! behaviour are `page-metrics`, `scroll-bottom`, `pagination-probe` and
//! `anchor-click`; any other tag answers with a configured response.

use super::{DriverError, DriverResult, PageDriver};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

const MORE_MARKER: &str = "<!--more-->";

#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    path: Vec<(String, usize)>,
}

#[derive(Debug, Default)]
pub struct MockDriver {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    url: String,
    html: String,
    history: Vec<(String, String)>,
    fragments: VecDeque<String>,
    scroll_loads: bool,
    probe_loads: bool,
    responses: HashMap<String, Value>,
    failing_scripts: HashSet<String>,
    actions: Vec<String>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Queue HTML appended at the `<!--more-->` marker by the next successful load.
    pub fn with_fragment(mut self, html: &str) -> Self {
        self.fragments.push_back(html.to_string());
        self
    }

    pub fn with_scroll_loading(mut self) -> Self {
        self.scroll_loads = true;
        self
    }

    pub fn with_probe_loading(mut self) -> Self {
        self.probe_loads = true;
        self
    }

    pub fn with_script_response(mut self, tag: &str, value: Value) -> Self {
        self.responses.insert(tag.to_string(), value);
        self
    }

    pub fn with_failing_script(mut self, tag: &str) -> Self {
        self.failing_scripts.insert(tag.to_string());
        self
    }

    /// Every state-changing call, in order: `goto <url>`, `click <selector>`,
    /// `back`, `script <tag>`, `scroll <selector>`.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn count_actions(&self, prefix: &str) -> usize {
        self.actions.iter().filter(|a| a.starts_with(prefix)).count()
    }

    fn navigate(&mut self, url: &str) {
        if !self.url.is_empty() {
            self.history
                .push((std::mem::take(&mut self.url), std::mem::take(&mut self.html)));
        }
        let target = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        self.html = self
            .pages
            .get(&target)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        self.url = target;
    }

    fn append_fragment(&mut self) -> bool {
        let Some(fragment) = self.fragments.pop_front() else {
            return false;
        };
        if self.html.contains(MORE_MARKER) {
            self.html = self
                .html
                .replacen(MORE_MARKER, &format!("{fragment}{MORE_MARKER}"), 1);
        } else {
            self.html.push_str(&fragment);
        }
        true
    }

    fn parse_selector(selector: &str) -> DriverResult<Selector> {
        Selector::parse(selector)
            .map_err(|e| DriverError::Command(format!("bad selector {selector}: {e:?}")))
    }

    fn locate<'a>(doc: &'a Html, element: &MockElement) -> Option<ElementRef<'a>> {
        let mut current = doc.root_element();
        for (selector, index) in &element.path {
            let parsed = Selector::parse(selector).ok()?;
            current = current.select(&parsed).nth(*index)?;
        }
        Some(current)
    }

    fn with_element<T>(
        &self,
        element: &MockElement,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> DriverResult<T> {
        let doc = Html::parse_document(&self.html);
        let found = Self::locate(&doc, element)
            .ok_or_else(|| DriverError::Command("element detached from document".into()))?;
        Ok(f(found))
    }

    fn select(&self, parent: Option<&MockElement>, selector: &str) -> DriverResult<Vec<MockElement>> {
        let parsed = Self::parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        let base = match parent {
            Some(p) => Self::locate(&doc, p)
                .ok_or_else(|| DriverError::Command("element detached from document".into()))?,
            None => doc.root_element(),
        };
        let prefix = parent.map(|p| p.path.clone()).unwrap_or_default();
        Ok((0..base.select(&parsed).count())
            .map(|index| {
                let mut path = prefix.clone();
                path.push((selector.to_string(), index));
                MockElement { path }
            })
            .collect())
    }

    fn visible_text(element: ElementRef<'_>) -> String {
        element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn click_anchor_by_text(&mut self, script: &str) -> bool {
        let label = script
            .split("const label = ")
            .nth(1)
            .and_then(|rest| rest.split(';').next())
            .and_then(|raw| serde_json::from_str::<String>(raw).ok());
        let Some(label) = label else {
            return false;
        };
        let target = {
            let doc = Html::parse_document(&self.html);
            let Ok(anchors) = Selector::parse("a") else {
                return false;
            };
            doc.root_element()
                .select(&anchors)
                .find(|a| Self::visible_text(*a) == label)
                .map(|a| a.value().attr("data-goto").map(str::to_string))
        };
        match target {
            Some(Some(url)) => {
                self.navigate(&url);
                true
            }
            Some(None) => true,
            None => false,
        }
    }
}

fn script_tag(script: &str) -> String {
    script
        .trim_start()
        .strip_prefix("/*")
        .and_then(|rest| rest.split("*/").next())
        .map(|tag| tag.trim().to_string())
        .unwrap_or_default()
}

impl PageDriver for MockDriver {
    type Element = MockElement;

    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.actions.push(format!("goto {url}"));
        self.navigate(url);
        Ok(())
    }

    async fn wait_for_idle(&mut self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<MockElement>> {
        self.select(None, selector)
    }

    async fn query_within(
        &self,
        parent: &MockElement,
        selector: &str,
    ) -> DriverResult<Vec<MockElement>> {
        self.select(Some(parent), selector)
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<Value> {
        let tag = script_tag(script);
        self.actions.push(format!("script {tag}"));
        if self.failing_scripts.contains(&tag) {
            return Err(DriverError::Script(format!("{tag} threw")));
        }
        let value = match tag.as_str() {
            "page-metrics" => {
                let doc = Html::parse_document(&self.html);
                let all = Self::parse_selector("*")?;
                json!([self.html.len(), doc.root_element().select(&all).count()])
            }
            "scroll-bottom" => {
                if self.scroll_loads {
                    self.append_fragment();
                }
                Value::Null
            }
            "pagination-probe" => json!(self.probe_loads && self.append_fragment()),
            "anchor-click" => json!(self.click_anchor_by_text(script)),
            other => self.responses.get(other).cloned().unwrap_or(Value::Null),
        };
        Ok(value)
    }

    async fn click(&mut self, element: &MockElement) -> DriverResult<()> {
        let selector = element.path.last().map(|(s, _)| s.clone()).unwrap_or_default();
        self.actions.push(format!("click {selector}"));
        let (goto, load_more, fails) = self.with_element(element, |el| {
            let v = el.value();
            (
                v.attr("data-goto").map(str::to_string),
                v.attr("data-load-more").is_some(),
                v.attr("data-fail-click").is_some(),
            )
        })?;
        if fails {
            return Err(DriverError::Command("element not interactable".into()));
        }
        if let Some(url) = goto {
            self.navigate(&url);
        } else if load_more {
            self.append_fragment();
        }
        Ok(())
    }

    async fn inner_text(&self, element: &MockElement) -> DriverResult<String> {
        self.with_element(element, Self::visible_text)
    }

    async fn inner_html(&self, element: &MockElement) -> DriverResult<String> {
        self.with_element(element, |el| el.inner_html())
    }

    async fn is_visible(&self, element: &MockElement) -> DriverResult<bool> {
        self.with_element(element, |el| {
            let v = el.value();
            let hidden_style = v
                .attr("style")
                .map(|s| s.replace(' ', "").contains("display:none"))
                .unwrap_or(false);
            v.attr("hidden").is_none() && !hidden_style
        })
    }

    async fn scroll_into_view(&mut self, element: &MockElement) -> DriverResult<()> {
        let selector = element.path.last().map(|(s, _)| s.clone()).unwrap_or_default();
        self.actions.push(format!("scroll {selector}"));
        Ok(())
    }

    async fn bounding_top(&self, element: &MockElement) -> DriverResult<f64> {
        self.with_element(element, |el| {
            el.value()
                .attr("data-top")
                .and_then(|t| t.parse::<f64>().ok())
                .unwrap_or(0.0)
        })
    }

    async fn go_back(&mut self) -> DriverResult<()> {
        self.actions.push("back".to_string());
        let (url, html) = self
            .history
            .pop()
            .ok_or_else(|| DriverError::Command("no history entry".into()))?;
        self.url = url;
        self.html = html;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.url.clone())
    }

    async fn quit(self) -> DriverResult<()> {
        Ok(())
    }
}
