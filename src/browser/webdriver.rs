//! W3C WebDriver backend.
//!
//! Connects to a running chromedriver (or any WebDriver server) through
//! `thirtyfour`. The server is probed over plain HTTP before a session is
//! requested so that a slow-starting driver produces a clear error instead of
//! a connection refusal deep inside session setup.

use super::{DriverError, DriverResult, PageDriver};
use serde_json::Value;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

const READY_STATE_SCRIPT: &str = "return document.readyState;";
const BOUNDING_TOP_SCRIPT: &str = "return arguments[0].getBoundingClientRect().top;";
const IDLE_POLL: Duration = Duration::from_millis(100);

impl From<WebDriverError> for DriverError {
    fn from(e: WebDriverError) -> Self {
        DriverError::Command(e.to_string())
    }
}

/// Browser launch options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub server_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

/// A live WebDriver session driving one Chrome tab.
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    /// Start a Chrome session.
    ///
    /// # Arguments
    ///
    /// * `options` - Server location, headless flag and viewport size
    ///
    /// # Returns
    ///
    /// A connected session, or an error if the capabilities are rejected or the
    /// server cannot create a session.
    #[instrument(level = "info", skip_all, fields(server = %options.server_url, headless = options.headless))]
    pub async fn connect(options: &SessionOptions) -> DriverResult<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if options.headless {
            caps.set_headless()?;
        }
        caps.add_arg(&format!(
            "--window-size={},{}",
            options.window_width, options.window_height
        ))?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--no-sandbox")?;

        let driver = WebDriver::new(options.server_url.as_str(), caps).await?;
        info!("WebDriver session started");
        Ok(Self { driver })
    }
}

/// Poll `{server_url}/status` until the server reports ready.
///
/// # Arguments
///
/// * `server_url` - Base URL of the WebDriver server
/// * `attempts` - Number of probes before giving up
/// * `interval` - Pause between probes
#[instrument(level = "info", skip(interval))]
pub async fn wait_until_ready(
    server_url: &str,
    attempts: usize,
    interval: Duration,
) -> DriverResult<()> {
    let status_url = format!("{}/status", server_url.trim_end_matches('/'));
    for attempt in 1..=attempts {
        match reqwest::get(&status_url).await {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(body) if body["value"]["ready"].as_bool().unwrap_or(false) => {
                    info!(attempt, "WebDriver server is ready");
                    return Ok(());
                }
                Ok(body) => debug!(attempt, %body, "WebDriver server not ready yet"),
                Err(e) => warn!(attempt, error = %e, "Unreadable WebDriver status body"),
            },
            Err(e) => debug!(attempt, error = %e, "WebDriver status probe failed"),
        }
        sleep(interval).await;
    }
    Err(DriverError::Command(format!(
        "WebDriver server at {server_url} not ready after {attempts} probes"
    )))
}

impl PageDriver for WebDriverSession {
    type Element = WebElement;

    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn wait_for_idle(&mut self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.driver.execute(READY_STATE_SCRIPT, Vec::new()).await?;
            if state.json().as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(timeout));
            }
            sleep(IDLE_POLL).await;
        }
    }

    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<WebElement>> {
        Ok(self.driver.find_all(By::Css(selector)).await?)
    }

    async fn query_within(
        &self,
        parent: &WebElement,
        selector: &str,
    ) -> DriverResult<Vec<WebElement>> {
        Ok(parent.find_all(By::Css(selector)).await?)
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<Value> {
        let ret = self
            .driver
            .execute(script, Vec::new())
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn click(&mut self, element: &WebElement) -> DriverResult<()> {
        element.click().await?;
        Ok(())
    }

    async fn inner_text(&self, element: &WebElement) -> DriverResult<String> {
        Ok(element.text().await?)
    }

    async fn inner_html(&self, element: &WebElement) -> DriverResult<String> {
        Ok(element.inner_html().await?)
    }

    async fn is_visible(&self, element: &WebElement) -> DriverResult<bool> {
        Ok(element.is_displayed().await?)
    }

    async fn scroll_into_view(&mut self, element: &WebElement) -> DriverResult<()> {
        element.scroll_into_view().await?;
        Ok(())
    }

    async fn bounding_top(&self, element: &WebElement) -> DriverResult<f64> {
        let ret = self
            .driver
            .execute(BOUNDING_TOP_SCRIPT, vec![element.to_json()?])
            .await?;
        ret.json()
            .as_f64()
            .ok_or_else(|| DriverError::Script("bounding rect top is not a number".into()))
    }

    async fn go_back(&mut self) -> DriverResult<()> {
        self.driver.back().await?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn quit(self) -> DriverResult<()> {
        self.driver.quit().await?;
        Ok(())
    }
}
