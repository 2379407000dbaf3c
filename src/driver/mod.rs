//! Page driver capability
//!
//! The crawl engine never talks to a browser directly. Everything goes through
//! the [`PageDriver`] and [`ElementHandle`] traits:
//! - `ChromiumDriver`: drives Chrome/Chromium over the DevTools protocol
//! - `ScriptedDriver`: replays a scripted page model in memory (tests, dry runs)

mod chromium;
pub mod scripted;

pub use chromium::{ChromiumDriver, ChromiumElement};
pub use scripted::{ScriptedDriver, ScriptedElement};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised by a page driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("browser session lost: {0}")]
    Session(String),
}

impl DriverError {
    /// Returns true for failures scoped to a single element
    ///
    /// Soft failures are absorbed by extraction (the element is skipped or the
    /// field left empty). Everything else means the browser session itself is
    /// unusable and must end the crawl.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound(_) | Self::StaleElement(_) | Self::NotInteractable(_) | Self::Script(_)
        )
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// A CSS or XPath expression identifying page elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Anchors below the current node whose visible text is exactly `text`
    pub fn link_text(text: &str) -> Self {
        Self::XPath(format!(".//a[normalize-space(.)={}]", xpath_literal(text)))
    }

    pub fn expression(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{}", s),
            Self::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Quotes a string as an XPath 1.0 literal
///
/// XPath has no escape sequences, so text holding both quote kinds is
/// assembled with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// A handle to one element of the current page
#[async_trait]
pub trait ElementHandle: Send + Sync + Sized {
    /// Rendered text of the element and its descendants
    async fn text(&self) -> DriverResult<String>;

    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, name: &str) -> DriverResult<Option<String>>;

    async fn click(&self) -> DriverResult<()>;

    /// Elements matching `locator` relative to this element, in DOM order
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self>>;

    /// First element matching `locator` relative to this element
    async fn find_one(&self, locator: &Locator) -> DriverResult<Option<Self>> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    /// Calls a JavaScript function declaration with `this` bound to the element
    async fn call_script(&self, function: &str) -> DriverResult<Value>;
}

/// Browser-automation capability consumed by the crawler
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: ElementHandle;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Elements matching `locator` in the whole page, in DOM order
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    async fn find_one(&self, locator: &Locator) -> DriverResult<Option<Self::Element>> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    /// Evaluates a JavaScript expression in the page
    async fn run_script(&self, code: &str) -> DriverResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_errors() {
        assert!(DriverError::ElementNotFound("a".to_string()).is_soft());
        assert!(DriverError::StaleElement("a".to_string()).is_soft());
        assert!(DriverError::NotInteractable("a".to_string()).is_soft());
        assert!(!DriverError::Session("closed".to_string()).is_soft());
        assert!(!DriverError::Timeout("navigate".to_string()).is_soft());
        assert!(!DriverError::Navigation("dns".to_string()).is_soft());
    }

    #[test]
    fn test_xpath_literal() {
        assert_eq!(xpath_literal("See Translation"), "'See Translation'");
        assert_eq!(xpath_literal("isn't"), "\"isn't\"");
        assert_eq!(
            xpath_literal(r#"it's "quoted""#),
            r#"concat('it', "'", 's "quoted"')"#
        );
    }

    #[test]
    fn test_link_text_locator() {
        let locator = Locator::link_text("See original");
        assert_eq!(
            locator,
            Locator::XPath(".//a[normalize-space(.)='See original']".to_string())
        );
        assert_eq!(locator.to_string(), "xpath:.//a[normalize-space(.)='See original']");
    }
}
