//! Chrome/Chromium page driver
//!
//! Wraps a single `chromiumoxide` page. CSS queries map directly onto the
//! DevTools DOM queries. XPath has no DevTools counterpart, so matches are
//! tagged in-page with a one-off marker attribute and then fetched by CSS.

use crate::config::BrowserConfig;
use crate::driver::{DriverError, DriverResult, ElementHandle, Locator, PageDriver};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures_util::stream::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const MARK_ATTRIBUTE: &str = "data-trawler-mark";

/// Page driver backed by a launched Chrome/Chromium instance
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    page: Page,
    marks: Arc<AtomicU64>,
}

/// An element of the page driven by [`ChromiumDriver`]
pub struct ChromiumElement {
    page: Page,
    element: Element,
    marks: Arc<AtomicU64>,
}

impl ChromiumDriver {
    /// Launches the browser and opens a blank page
    pub async fn launch(config: &BrowserConfig) -> DriverResult<Self> {
        let mut builder = LaunchConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let launch_config = builder.build().map_err(DriverError::Session)?;

        let (browser, mut handler) = Browser::launch(launch_config).await.map_err(classify)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(classify)?;
        tracing::info!("Browser launched (headless: {})", config.headless);

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            page,
            marks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Closes the browser and waits for its event handler to finish
    pub async fn close(self) -> DriverResult<()> {
        {
            let mut browser = self.browser.lock().await;
            browser.close().await.map_err(classify)?;
        }
        let _ = self.handler.await;
        Ok(())
    }

    fn wrap(&self, element: Element) -> ChromiumElement {
        ChromiumElement {
            page: self.page.clone(),
            element,
            marks: Arc::clone(&self.marks),
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await.map_err(classify)?.unwrap_or_default())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ChromiumElement>> {
        let elements = match locator {
            Locator::Css(selector) => self.page.find_elements(selector.as_str()).await,
            Locator::XPath(expression) => {
                let token = next_token(&self.marks);
                let script = format!("({})()", mark_script(expression, &token, "document"));
                self.page.evaluate(script).await.map_err(classify)?;
                self.page.find_elements(mark_selector(&token)).await
            }
        };
        let elements = elements.map_err(classify)?;
        Ok(elements.into_iter().map(|e| self.wrap(e)).collect())
    }

    async fn run_script(&self, code: &str) -> DriverResult<Value> {
        let result = self.page.evaluate(code).await.map_err(classify)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn text(&self) -> DriverResult<String> {
        Ok(self
            .element
            .inner_text()
            .await
            .map_err(classify)?
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        self.element.attribute(name).await.map_err(classify)
    }

    async fn click(&self) -> DriverResult<()> {
        self.element.click().await.map_err(classify)?;
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ChromiumElement>> {
        let elements = match locator {
            Locator::Css(selector) => self.element.find_elements(selector.as_str()).await,
            Locator::XPath(expression) => {
                // Relative XPath may select ancestors, so the marked nodes are
                // looked up page-wide rather than below this element.
                let token = next_token(&self.marks);
                self.element
                    .call_js_fn(mark_script(expression, &token, "this"), false)
                    .await
                    .map_err(classify)?;
                self.page.find_elements(mark_selector(&token)).await
            }
        };
        let elements = elements.map_err(classify)?;
        Ok(elements
            .into_iter()
            .map(|element| ChromiumElement {
                page: self.page.clone(),
                element,
                marks: Arc::clone(&self.marks),
            })
            .collect())
    }

    async fn call_script(&self, function: &str) -> DriverResult<Value> {
        let returns = self
            .element
            .call_js_fn(function, false)
            .await
            .map_err(classify)?;
        if let Some(details) = returns.exception_details {
            return Err(DriverError::Script(details.text));
        }
        Ok(returns.result.value.unwrap_or(Value::Null))
    }
}

fn next_token(marks: &AtomicU64) -> String {
    format!("m{}", marks.fetch_add(1, Ordering::Relaxed))
}

fn mark_selector(token: &str) -> String {
    format!("[{}='{}']", MARK_ATTRIBUTE, token)
}

/// Builds a function declaration tagging every XPath match with `token`
fn mark_script(expression: &str, token: &str, context: &str) -> String {
    let expression = Value::String(expression.to_string());
    let token = Value::String(token.to_string());
    format!(
        "function() {{ \
            const found = document.evaluate({expression}, {context}, null, \
                XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
            for (let i = 0; i < found.snapshotLength; i++) {{ \
                const node = found.snapshotItem(i); \
                if (node.nodeType === 1) node.setAttribute('{attribute}', {token}); \
            }} \
            return found.snapshotLength; \
        }}",
        attribute = MARK_ATTRIBUTE,
    )
}

/// Maps a DevTools error onto the driver taxonomy
fn classify(err: CdpError) -> DriverError {
    match err {
        CdpError::NotFound => DriverError::ElementNotFound("node not found".to_string()),
        CdpError::Timeout => DriverError::Timeout("devtools request timed out".to_string()),
        CdpError::JavascriptException(details) => DriverError::Script(details.text.clone()),
        CdpError::ScrollingFailed(msg) => DriverError::NotInteractable(msg),
        other => {
            let message = other.to_string();
            if message.contains("node") || message.contains("Node") {
                DriverError::StaleElement(message)
            } else {
                DriverError::Session(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_script_quotes_expression() {
        let script = mark_script("//a[@title=\"x\"]", "m7", "this");
        assert!(script.contains(r#"document.evaluate("//a[@title=\"x\"]", this,"#));
        assert!(script.contains(r#"setAttribute('data-trawler-mark', "m7")"#));
    }

    #[test]
    fn test_mark_selector() {
        assert_eq!(mark_selector("m3"), "[data-trawler-mark='m3']");
    }

    #[test]
    fn test_next_token_is_unique() {
        let marks = AtomicU64::new(0);
        assert_eq!(next_token(&marks), "m0");
        assert_eq!(next_token(&marks), "m1");
    }
}
