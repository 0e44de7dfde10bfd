//! Browser session abstraction used by the crawl pipeline.
//!
//! The pipeline never talks to a concrete browser. It drives a [`Page`], which
//! wraps any [`PageDriver`] backend and tracks the *page view* the browser is
//! currently showing.
//!
//! # Page views and handles
//!
//! Every navigation, click, history step or DOM-mutating script starts a new
//! page view. Element lookups return a [`Handle`] stamped with the view that
//! produced it, and every element operation on [`Page`] checks that stamp. A
//! handle from an earlier view is rejected with [`DriverError::StaleHandle`]
//! instead of being forwarded to the driver, so a post element captured before
//! a "load more" click or a comment detour can never be acted upon by accident.
//!
//! # Submodules
//!
//! - [`webdriver`]: W3C WebDriver backend built on `thirtyfour`
//! - `mock`: in-memory backend for unit tests

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[cfg(test)]
pub mod mock;
pub mod webdriver;

/// Errors surfaced by a browser backend or by handle validation.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The backend rejected or failed a command.
    #[error("driver command failed: {0}")]
    Command(String),

    /// An in-page script threw or returned something unusable.
    #[error("in-page script failed: {0}")]
    Script(String),

    /// A handle was used after the page view that produced it ended.
    #[error("element handle from page view {handle} used on page view {current}")]
    StaleHandle { handle: u64, current: u64 },

    /// The document did not finish loading in time.
    #[error("timed out after {0:?} waiting for the page to settle")]
    Timeout(Duration),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Narrow contract over a single browser tab.
///
/// Implementations are expected to be thin: they forward each call to the
/// underlying automation protocol and translate its errors. View tracking and
/// settle delays live in [`Page`].
pub trait PageDriver {
    /// Backend-specific element reference.
    type Element: Clone + fmt::Debug;

    /// Navigate the tab to `url`.
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    /// Block until the document reports it has finished loading, or fail with
    /// [`DriverError::Timeout`].
    async fn wait_for_idle(&mut self, timeout: Duration) -> DriverResult<()>;

    /// All elements in the document matching a CSS selector, in document order.
    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<Self::Element>>;

    /// Elements below `parent` matching a CSS selector.
    async fn query_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> DriverResult<Vec<Self::Element>>;

    /// Run `script` as a function body in the page and return its value.
    async fn evaluate(&mut self, script: &str) -> DriverResult<Value>;

    /// Click the element as a user would.
    async fn click(&mut self, element: &Self::Element) -> DriverResult<()>;

    /// Rendered text of the element.
    async fn inner_text(&self, element: &Self::Element) -> DriverResult<String>;

    /// Markup inside the element.
    async fn inner_html(&self, element: &Self::Element) -> DriverResult<String>;

    /// Whether the element is displayed.
    async fn is_visible(&self, element: &Self::Element) -> DriverResult<bool>;

    /// Scroll until the element is inside the viewport.
    async fn scroll_into_view(&mut self, element: &Self::Element) -> DriverResult<()>;

    /// Viewport-relative top edge of the element's bounding box, in CSS pixels.
    async fn bounding_top(&self, element: &Self::Element) -> DriverResult<f64>;

    /// Step back one entry in the tab's history.
    async fn go_back(&mut self) -> DriverResult<()>;

    /// Address of the document currently shown.
    async fn current_url(&self) -> DriverResult<String>;

    /// End the browser session.
    async fn quit(self) -> DriverResult<()>;
}

/// An element reference valid only for the page view that produced it.
#[derive(Debug, Clone)]
pub struct Handle<E> {
    /// Backend reference to the element.
    element: E,
    /// Page view the element was found in.
    view: u64,
}

impl<E> Handle<E> {
    /// The page view this handle was captured in.
    pub fn view(&self) -> u64 {
        self.view
    }
}

/// A driven browser tab with page-view tracking.
pub struct Page<D: PageDriver> {
    driver: D,
    /// Current page view. Advanced by every navigation or mutating action.
    view: u64,
    /// Fixed pause after each navigation or click.
    settle: Duration,
    /// Upper bound for [`PageDriver::wait_for_idle`].
    idle_timeout: Duration,
}

impl<D: PageDriver> fmt::Debug for Page<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("view", &self.view)
            .field("settle", &self.settle)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl<D: PageDriver> Page<D> {
    /// Wrap a driver.
    ///
    /// # Arguments
    ///
    /// * `driver` - The backend to drive
    /// * `settle` - Fixed pause after each navigation or click, covering client-side
    ///   rendering that finishes after the document reports ready
    /// * `idle_timeout` - Upper bound for [`PageDriver::wait_for_idle`]
    pub fn new(driver: D, settle: Duration, idle_timeout: Duration) -> Self {
        Self {
            driver,
            view: 0,
            settle,
            idle_timeout,
        }
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    /// Whether `handle` belongs to the page view currently displayed.
    pub fn is_current(&self, handle: &Handle<D::Element>) -> bool {
        handle.view == self.view
    }

    #[cfg(test)]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn resolve<'h>(&self, handle: &'h Handle<D::Element>) -> DriverResult<&'h D::Element> {
        if handle.view != self.view {
            return Err(DriverError::StaleHandle {
                handle: handle.view,
                current: self.view,
            });
        }
        Ok(&handle.element)
    }

    fn stamp(&self, elements: Vec<D::Element>) -> Vec<Handle<D::Element>> {
        elements
            .into_iter()
            .map(|element| Handle {
                element,
                view: self.view,
            })
            .collect()
    }

    /// Start a new page view and let it settle.
    async fn advance(&mut self) -> DriverResult<()> {
        self.view += 1;
        debug!(view = self.view, "page view advanced");
        self.driver.wait_for_idle(self.idle_timeout).await?;
        if !self.settle.is_zero() {
            sleep(self.settle).await;
        }
        Ok(())
    }

    pub async fn goto(&mut self, url: &str) -> DriverResult<()> {
        let navigated = self.driver.goto(url).await;
        let settled = self.advance().await;
        navigated.and(settled)
    }

    pub async fn go_back(&mut self) -> DriverResult<()> {
        let navigated = self.driver.go_back().await;
        let settled = self.advance().await;
        navigated.and(settled)
    }

    /// Click an element. Always starts a new page view, even when the click fails,
    /// because a failed click may still have had side effects.
    pub async fn click(&mut self, handle: &Handle<D::Element>) -> DriverResult<()> {
        let element = self.resolve(handle)?.clone();
        let clicked = self.driver.click(&element).await;
        let settled = self.advance().await;
        clicked.and(settled)
    }

    /// Evaluate a script that only reads page state.
    pub async fn evaluate(&mut self, script: &str) -> DriverResult<Value> {
        self.driver.evaluate(script).await
    }

    /// Evaluate a script that may click, navigate or mutate the DOM.
    pub async fn run_script(&mut self, script: &str) -> DriverResult<Value> {
        let value = self.driver.evaluate(script).await;
        let settled = self.advance().await;
        let value = value?;
        settled.map(|_| value)
    }

    pub async fn query_all(&self, selector: &str) -> DriverResult<Vec<Handle<D::Element>>> {
        let found = self.driver.query_selector_all(selector).await?;
        Ok(self.stamp(found))
    }

    pub async fn query_within(
        &self,
        parent: &Handle<D::Element>,
        selector: &str,
    ) -> DriverResult<Vec<Handle<D::Element>>> {
        let element = self.resolve(parent)?;
        let found = self.driver.query_within(element, selector).await?;
        Ok(self.stamp(found))
    }

    pub async fn text(&self, handle: &Handle<D::Element>) -> DriverResult<String> {
        let element = self.resolve(handle)?;
        self.driver.inner_text(element).await
    }

    pub async fn html(&self, handle: &Handle<D::Element>) -> DriverResult<String> {
        let element = self.resolve(handle)?;
        self.driver.inner_html(element).await
    }

    pub async fn is_visible(&self, handle: &Handle<D::Element>) -> DriverResult<bool> {
        let element = self.resolve(handle)?;
        self.driver.is_visible(element).await
    }

    pub async fn top(&self, handle: &Handle<D::Element>) -> DriverResult<f64> {
        let element = self.resolve(handle)?;
        self.driver.bounding_top(element).await
    }

    pub async fn scroll_into_view(&mut self, handle: &Handle<D::Element>) -> DriverResult<()> {
        let element = self.resolve(handle)?.clone();
        self.driver.scroll_into_view(&element).await
    }

    pub async fn current_url(&self) -> DriverResult<String> {
        self.driver.current_url().await
    }

    pub async fn close(self) -> DriverResult<()> {
        self.driver.quit().await
    }
}
