//! Load-more-until-exhausted pagination
//!
//! Every list crawl follows the same loop: query the list, extract the
//! elements not seen yet, scroll to make the page load more, wait, and query
//! again until the list stops growing.

use crate::crawler::CrawlSession;
use crate::driver::{DriverResult, Locator, PageDriver};
use async_trait::async_trait;

/// Turns one list element into an item
#[async_trait]
pub trait Extractor<D: PageDriver>: Send + Sync {
    type Item: Send;

    /// Extracts the element's item
    ///
    /// A soft error skips the element; a hard error ends the crawl.
    async fn extract(&self, session: &CrawlSession<D>, element: &D::Element) -> DriverResult<Self::Item>;
}

/// Where a list lives and how it is paginated
pub struct ListScope<'a, E> {
    /// Matches the list's elements
    pub locator: &'a Locator,

    /// Page loaded before the first query; `None` stays on the current page
    pub start_url: Option<&'a str>,

    /// Element the list is queried within; `None` queries the whole page
    pub root: Option<&'a E>,

    /// Scrollable region that loads more elements; `None` scrolls the window
    pub scroller: Option<&'a E>,

    /// Maximum number of items to deliver, 0 for no limit
    pub limit: usize,
}

impl<'a, E> ListScope<'a, E> {
    /// A whole-page list at `start_url`, scrolled by the window
    pub fn page(locator: &'a Locator, start_url: &'a str) -> Self {
        Self {
            locator,
            start_url: Some(start_url),
            root: None,
            scroller: None,
            limit: 0,
        }
    }

    /// A list inside a scrollable region of the current page
    pub fn region(locator: &'a Locator, region: &'a E) -> Self {
        Self {
            locator,
            start_url: None,
            root: Some(region),
            scroller: Some(region),
            limit: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Paginates a list, handing each extracted item to `on_item` with its
/// 1-based sequence number
///
/// Returns the number of items delivered. A stop request ends the crawl
/// before the next element and returns the partial count.
pub async fn paginate<D, X, F>(
    session: &CrawlSession<D>,
    scope: &ListScope<'_, D::Element>,
    extractor: &X,
    mut on_item: F,
) -> DriverResult<usize>
where
    D: PageDriver,
    X: Extractor<D>,
    F: FnMut(X::Item, usize),
{
    if let Some(url) = scope.start_url {
        session.load(url, false, true).await?;
    }

    let reached_limit = |delivered: usize| scope.limit > 0 && delivered >= scope.limit;

    // Elements before `cursor` were already handled; `delivered` excludes skipped ones
    let mut cursor = 0;
    let mut delivered = 0;

    loop {
        let elements = match scope.root {
            Some(root) => session.find_in(root, scope.locator).await?,
            None => session.find_all(scope.locator).await?,
        };

        if elements.len() <= cursor {
            if elements.len() < cursor {
                tracing::warn!(
                    "List {} shrank from {} to {} elements, treating it as exhausted",
                    scope.locator,
                    cursor,
                    elements.len()
                );
            }
            break;
        }
        tracing::debug!(
            "List {}: {} new elements",
            scope.locator,
            elements.len() - cursor
        );

        for element in &elements[cursor..] {
            if session.control().is_stop_requested() {
                tracing::info!("Stop requested, ending list after {} items", delivered);
                return Ok(delivered);
            }
            if reached_limit(delivered) {
                return Ok(delivered);
            }

            cursor += 1;
            match extractor.extract(session, element).await {
                Ok(item) => {
                    delivered += 1;
                    on_item(item, delivered);
                }
                Err(e) if e.is_soft() => {
                    tracing::warn!("Skipping element {} of {}: {}", cursor, scope.locator, e);
                }
                Err(e) => return Err(e),
            }
        }

        if reached_limit(delivered) {
            break;
        }

        match scope.scroller {
            Some(region) => session.scroll_region(region).await?,
            None => session.scroll_to_bottom().await?,
        }
        session.wait(1.0).await;
    }

    tracing::debug!("List {} exhausted after {} items", scope.locator, delivered);
    Ok(delivered)
}
