use crate::config::CrawlerConfig;
use crate::driver::{DriverError, DriverResult, ElementHandle, Locator, PageDriver};
use crate::state::{Controller, DelayRegulator};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW_SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const REGION_SCROLL_SCRIPT: &str = "function() { this.scrollTop = this.scrollHeight; }";
const CENTRE_SCRIPT: &str = "function() { \
    window.scrollTo(0, this.getBoundingClientRect().top + window.pageYOffset - window.innerHeight / 2); \
}";
const BACKGROUND_SCRIPT: &str = "function() { \
    const style = this.currentStyle || window.getComputedStyle(this, false); \
    return style.backgroundImage; \
}";

/// Turns a soft driver failure into `None`, keeping hard failures
pub fn optional<T>(result: DriverResult<T>) -> DriverResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_soft() => {
            tracing::debug!("Optional element unavailable: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Extracts the URL of a computed `background-image` value
///
/// Returns `None` for `none` and for empty values.
pub fn strip_css_url(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "none" {
        return None;
    }
    let value = value.strip_prefix("url(").unwrap_or(value);
    let value = value.strip_suffix(')').unwrap_or(value);
    let value = value.trim().trim_matches('"').trim_matches('\'');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Browser session shared by every crawl operation
///
/// Owns the page driver, the run/pause/stop controller and the load-time
/// statistics. Every driver call made through the session is bounded by the
/// operation timeout.
pub struct CrawlSession<D: PageDriver> {
    driver: D,
    control: Arc<Controller>,
    delay: DelayRegulator,
    operation_timeout: Duration,
    click_retries: u32,
    retry_wait: Duration,
}

impl<D: PageDriver> CrawlSession<D> {
    pub fn new(driver: D, config: &CrawlerConfig) -> Self {
        Self {
            driver,
            control: Arc::new(Controller::new()),
            delay: DelayRegulator::from_config(config),
            operation_timeout: config.operation_timeout(),
            click_retries: config.click_retries.max(1),
            retry_wait: config.retry_wait(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn control(&self) -> &Arc<Controller> {
        &self.control
    }

    pub fn delay(&self) -> &DelayRegulator {
        &self.delay
    }

    async fn bounded<T, F>(&self, operation: &str, future: F) -> DriverResult<T>
    where
        F: Future<Output = DriverResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(format!(
                "{} did not complete within {:.1}s",
                operation,
                self.operation_timeout.as_secs_f64()
            ))),
        }
    }

    /// Loads `url` unless the browser is already there
    ///
    /// The navigation time is recorded with the delay regulator. With
    /// `scroll` the page is scrolled to the bottom once loaded, which
    /// triggers the first infinite-scroll batch.
    pub async fn load(&self, url: &str, force: bool, scroll: bool) -> DriverResult<()> {
        if !force && self.current_url().await? == url {
            tracing::debug!("Already on {}", url);
            return Ok(());
        }

        let start = Instant::now();
        self.bounded("navigate", self.driver.navigate(url)).await?;
        let elapsed = start.elapsed();
        self.delay.record_load(elapsed);
        tracing::debug!("Loaded {} in {:.2}s", url, elapsed.as_secs_f64());

        if scroll {
            self.scroll_to_bottom().await?;
        }
        Ok(())
    }

    pub async fn current_url(&self) -> DriverResult<String> {
        self.bounded("current_url", self.driver.current_url()).await
    }

    /// Waits one adaptive delay, then honours a pending pause
    pub async fn wait(&self, multiplier: f64) {
        self.delay.sleep(multiplier, &self.control).await;
    }

    pub async fn run_script(&self, code: &str) -> DriverResult<Value> {
        self.bounded("run_script", self.driver.run_script(code)).await
    }

    pub async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<D::Element>> {
        self.bounded("find_all", self.driver.find_all(locator)).await
    }

    pub async fn find_one(&self, locator: &Locator) -> DriverResult<Option<D::Element>> {
        self.bounded("find_one", self.driver.find_one(locator)).await
    }

    pub async fn find_in(&self, element: &D::Element, locator: &Locator) -> DriverResult<Vec<D::Element>> {
        self.bounded("find_all", element.find_all(locator)).await
    }

    pub async fn find_one_in(
        &self,
        element: &D::Element,
        locator: &Locator,
    ) -> DriverResult<Option<D::Element>> {
        self.bounded("find_one", element.find_one(locator)).await
    }

    /// Like [`find_one_in`](Self::find_one_in), but absence is an `ElementNotFound` error
    pub async fn require_in(&self, element: &D::Element, locator: &Locator) -> DriverResult<D::Element> {
        self.find_one_in(element, locator)
            .await?
            .ok_or_else(|| DriverError::ElementNotFound(locator.to_string()))
    }

    pub async fn text(&self, element: &D::Element) -> DriverResult<String> {
        self.bounded("text", element.text()).await
    }

    pub async fn attribute(&self, element: &D::Element, name: &str) -> DriverResult<Option<String>> {
        self.bounded("attribute", element.attribute(name)).await
    }

    pub async fn click(&self, element: &D::Element) -> DriverResult<()> {
        self.bounded("click", element.click()).await
    }

    pub async fn call(&self, element: &D::Element, function: &str) -> DriverResult<Value> {
        self.bounded("call_script", element.call_script(function)).await
    }

    /// Scrolls the window to the bottom of the page
    pub async fn scroll_to_bottom(&self) -> DriverResult<()> {
        self.run_script(WINDOW_SCROLL_SCRIPT).await.map(|_| ())
    }

    /// Scrolls a scrollable region (such as a dialog) to its bottom
    pub async fn scroll_region(&self, region: &D::Element) -> DriverResult<()> {
        self.call(region, REGION_SCROLL_SCRIPT).await.map(|_| ())
    }

    /// Scrolls the window so that `element` sits mid-screen
    pub async fn centre_on(&self, element: &D::Element) -> DriverResult<()> {
        self.call(element, CENTRE_SCRIPT).await.map(|_| ())
    }

    /// Clicks `clickable` until the text of `parent` changes
    ///
    /// Makes up to `click-retries` attempts with a short pause after each and
    /// a full delay before the last one. Returns whether
    /// the text changed. Element-level failures end the attempts early and
    /// count as no change.
    pub async fn force_click(&self, parent: &D::Element, clickable: &D::Element) -> DriverResult<bool> {
        let before = self.text(parent).await?;
        if let Err(e) = self.centre_on(clickable).await {
            if !e.is_soft() {
                return Err(e);
            }
        }

        for attempt in 1..=self.click_retries {
            match self.click(clickable).await {
                Ok(()) => {}
                Err(e) if e.is_soft() => {
                    tracing::debug!("Click attempt {} failed: {}", attempt, e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.retry_wait).await;
            if attempt + 1 == self.click_retries {
                self.wait(1.0).await;
            }

            match optional(self.text(parent).await)? {
                Some(after) if after != before => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }

        tracing::debug!("No change after {} clicks", self.click_retries);
        Ok(false)
    }

    /// Clicks `clickable` until `locator` matches inside `container`
    ///
    /// Paces the attempts like [`force_click`](Self::force_click). Returns
    /// `None` when nothing appeared or the clickable stopped responding.
    pub async fn reveal(
        &self,
        clickable: &D::Element,
        container: &D::Element,
        locator: &Locator,
    ) -> DriverResult<Option<D::Element>> {
        for attempt in 1..=self.click_retries {
            match self.click(clickable).await {
                Ok(()) => {}
                Err(e) if e.is_soft() => {
                    tracing::debug!("Click attempt {} failed: {}", attempt, e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.retry_wait).await;
            if attempt + 1 == self.click_retries {
                self.wait(1.0).await;
            }

            if let Some(revealed) = optional(self.find_one_in(container, locator).await)?.flatten() {
                return Ok(Some(revealed));
            }
        }

        tracing::debug!("Nothing revealed after {} clicks", self.click_retries);
        Ok(None)
    }

    /// URL of an element's computed background image
    pub async fn background_image_url(&self, element: &D::Element) -> DriverResult<Option<String>> {
        let value = self.call(element, BACKGROUND_SCRIPT).await?;
        Ok(value.as_str().and_then(strip_css_url))
    }

    /// Checks a loaded target against the "page unavailable" banner
    ///
    /// A missing banner means the page is valid.
    pub async fn is_valid_target(&self, url: &str, banner: &Locator, phrase: &str) -> DriverResult<bool> {
        self.load(url, false, true).await?;
        let Some(header) = self.find_one(banner).await? else {
            return Ok(true);
        };
        let Some(text) = optional(self.text(&header).await)? else {
            return Ok(true);
        };
        Ok(!text.to_lowercase().contains(&phrase.to_lowercase()))
    }

    /// Fills and submits a login form; succeeds if the browser leaves the login page
    pub async fn login(
        &self,
        login_url: &str,
        fields: &LoginForm<'_>,
        user: &str,
        password: &str,
    ) -> DriverResult<bool> {
        self.load(login_url, false, false).await?;
        self.run_script(&set_value_script(fields.email, user)).await?;
        self.run_script(&set_value_script(fields.password, password))
            .await?;
        self.run_script(&format!(
            "document.querySelector({}).submit();",
            js_string(fields.form)
        ))
        .await?;
        self.wait(1.0).await;

        let url = self.current_url().await?;
        Ok(!url.contains("login"))
    }
}

/// Selectors of the login form
#[derive(Debug, Clone, Copy)]
pub struct LoginForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub form: &'a str,
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn set_value_script(selector: &str, value: &str) -> String {
    format!(
        "document.querySelector({}).value = {};",
        js_string(selector),
        js_string(value)
    )
}
