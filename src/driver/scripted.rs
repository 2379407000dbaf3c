//! In-memory page driver
//!
//! `ScriptedDriver` serves pages assembled from [`ScriptedElement`] trees.
//! Every locator maps to whatever element list was registered for it, so a
//! page model only needs the queries the crawl will actually make. Lists can
//! be given a growth schedule: the number of visible elements after 0, 1, 2…
//! scrolls of the page (or of the element owning the list). Clicks can run
//! [`ClickAction`]s to mutate the model, which is how "see more" and
//! translation links are simulated.

use crate::driver::{DriverError, DriverResult, ElementHandle, Locator, PageDriver};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const WINDOW_SCROLL: &str = "scrollTo(0, document.body.scrollHeight)";
const REGION_SCROLL: &str = "scrollTop";
const BACKGROUND_IMAGE: &str = "backgroundImage";

/// Attribute consulted when a script asks for an element's computed background
pub const BACKGROUND_IMAGE_ATTRIBUTE: &str = "style:background-image";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mutation applied to the page model when an element is clicked
#[derive(Clone)]
pub enum ClickAction {
    SetText {
        target: ScriptedElement,
        text: String,
    },
    AddChild {
        target: ScriptedElement,
        locator: Locator,
        child: ScriptedElement,
    },
    ClearChildren {
        target: ScriptedElement,
        locator: Locator,
    },
}

#[derive(Default)]
struct ChildList {
    items: Vec<ScriptedElement>,
    growth: Vec<usize>,
}

#[derive(Default)]
struct ElementNode {
    text: Mutex<String>,
    attributes: Mutex<HashMap<String, String>>,
    children: Mutex<HashMap<Locator, ChildList>>,
    on_click: Mutex<Vec<ClickAction>>,
    queries: Mutex<HashMap<Locator, usize>>,
    detached: AtomicBool,
    session_lost: AtomicBool,
    interactable: AtomicBool,
    clicks: AtomicUsize,
    scrolls: AtomicUsize,
}

/// An element of a scripted page, shared by reference
#[derive(Clone)]
pub struct ScriptedElement {
    node: Arc<ElementNode>,
}

impl ScriptedElement {
    pub fn new(text: impl Into<String>) -> Self {
        let element = Self {
            node: Arc::new(ElementNode::default()),
        };
        *lock(&element.node.text) = text.into();
        element.node.interactable.store(true, Ordering::SeqCst);
        element
    }

    pub fn with_attribute(self, name: &str, value: impl Into<String>) -> Self {
        lock(&self.node.attributes).insert(name.to_string(), value.into());
        self
    }

    /// Registers the elements returned when `locator` is queried on this element
    pub fn with_children(self, locator: Locator, children: Vec<ScriptedElement>) -> Self {
        lock(&self.node.children).entry(locator).or_default().items = children;
        self
    }

    /// Sets how many of the `locator` children are visible after each scroll
    ///
    /// The last entry applies to every later scroll.
    pub fn with_growth(self, locator: Locator, growth: Vec<usize>) -> Self {
        lock(&self.node.children).entry(locator).or_default().growth = growth;
        self
    }

    pub fn on_click(self, action: ClickAction) -> Self {
        lock(&self.node.on_click).push(action);
        self
    }

    /// Makes clicks fail as if the element were covered or hidden
    pub fn not_interactable(self) -> Self {
        self.node.interactable.store(false, Ordering::SeqCst);
        self
    }

    /// Removes the element from the page; later calls report a stale reference
    pub fn detach(&self) {
        self.node.detached.store(true, Ordering::SeqCst);
    }

    /// Makes every later call on this element fail as a lost browser session
    pub fn lose_session(&self) {
        self.node.session_lost.store(true, Ordering::SeqCst);
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *lock(&self.node.text) = text.into();
    }

    pub fn add_child(&self, locator: Locator, child: ScriptedElement) {
        lock(&self.node.children)
            .entry(locator)
            .or_default()
            .items
            .push(child);
    }

    pub fn clear_children(&self, locator: &Locator) {
        if let Some(list) = lock(&self.node.children).get_mut(locator) {
            list.items.clear();
        }
    }

    pub fn click_count(&self) -> usize {
        self.node.clicks.load(Ordering::SeqCst)
    }

    pub fn scroll_count(&self) -> usize {
        self.node.scrolls.load(Ordering::SeqCst)
    }

    /// Number of times `locator` was queried on this element
    pub fn query_count(&self, locator: &Locator) -> usize {
        lock(&self.node.queries).get(locator).copied().unwrap_or(0)
    }

    fn scroll(&self) {
        self.node.scrolls.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_scroll(&self) {
        self.node.scrolls.store(0, Ordering::SeqCst);
    }

    fn check(&self) -> DriverResult<()> {
        if self.node.session_lost.load(Ordering::SeqCst) {
            return Err(DriverError::Session("browser closed".to_string()));
        }
        if self.node.detached.load(Ordering::SeqCst) {
            return Err(DriverError::StaleElement(
                "element is no longer attached to the page".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(action: &ClickAction) {
        match action {
            ClickAction::SetText { target, text } => target.set_text(text.clone()),
            ClickAction::AddChild {
                target,
                locator,
                child,
            } => target.add_child(locator.clone(), child.clone()),
            ClickAction::ClearChildren { target, locator } => target.clear_children(locator),
        }
    }

    fn visible_children(&self, locator: &Locator) -> Vec<ScriptedElement> {
        *lock(&self.node.queries).entry(locator.clone()).or_insert(0) += 1;

        let children = lock(&self.node.children);
        let Some(list) = children.get(locator) else {
            return Vec::new();
        };
        let visible = match list.growth.last() {
            None => list.items.len(),
            Some(last) => {
                let scrolls = self.scroll_count();
                list.growth.get(scrolls).copied().unwrap_or(*last)
            }
        };
        list.items.iter().take(visible).cloned().collect()
    }
}

#[async_trait]
impl ElementHandle for ScriptedElement {
    async fn text(&self) -> DriverResult<String> {
        self.check()?;
        Ok(lock(&self.node.text).clone())
    }

    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        self.check()?;
        Ok(lock(&self.node.attributes).get(name).cloned())
    }

    async fn click(&self) -> DriverResult<()> {
        self.check()?;
        if !self.node.interactable.load(Ordering::SeqCst) {
            return Err(DriverError::NotInteractable(
                "element is not visible".to_string(),
            ));
        }
        self.node.clicks.fetch_add(1, Ordering::SeqCst);
        let actions = lock(&self.node.on_click).clone();
        for action in &actions {
            Self::apply(action);
        }
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ScriptedElement>> {
        self.check()?;
        Ok(self.visible_children(locator))
    }

    async fn call_script(&self, function: &str) -> DriverResult<Value> {
        self.check()?;
        if function.contains(REGION_SCROLL) {
            self.scroll();
        } else if function.contains(BACKGROUND_IMAGE) {
            let background = lock(&self.node.attributes)
                .get(BACKGROUND_IMAGE_ATTRIBUTE)
                .cloned()
                .unwrap_or_else(|| "none".to_string());
            return Ok(Value::String(background));
        }
        Ok(Value::Null)
    }
}

/// Page driver replaying an in-memory page model
pub struct ScriptedDriver {
    pages: Mutex<HashMap<String, ScriptedElement>>,
    url: Mutex<String>,
    navigations: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    redirects: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    blank: ScriptedElement,
    load_time: Duration,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            url: Mutex::new("about:blank".to_string()),
            navigations: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            redirects: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            blank: ScriptedElement::new(""),
            load_time: Duration::ZERO,
        }
    }

    /// Serves `document` as the page at `url`
    pub fn with_page(self, url: &str, document: ScriptedElement) -> Self {
        lock(&self.pages).insert(url.to_string(), document);
        self
    }

    /// Time each navigation takes (observed by the tokio clock)
    pub fn with_load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }

    /// Moves the browser to `url` whenever a page script contains `pattern`
    pub fn redirect_on_script(self, pattern: &str, url: &str) -> Self {
        lock(&self.redirects).push((pattern.to_string(), url.to_string()));
        self
    }

    /// Makes navigation to `url` fail
    pub fn fail_navigation(self, url: &str) -> Self {
        lock(&self.failing).insert(url.to_string());
        self
    }

    fn page(&self, url: &str) -> Option<ScriptedElement> {
        lock(&self.pages).get(url).cloned()
    }

    /// Every URL navigated to, in order
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    /// Every page-level script run, in order
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.scripts).clone()
    }

    /// Number of page-level queries of `locator` on the current page
    pub fn query_count(&self, locator: &Locator) -> usize {
        self.document().query_count(locator)
    }

    fn document(&self) -> ScriptedElement {
        let url = lock(&self.url).clone();
        self.page(&url).unwrap_or_else(|| self.blank.clone())
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    type Element = ScriptedElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let failing = lock(&self.failing).contains(url);
        if failing {
            return Err(DriverError::Navigation(format!("{}: connection refused", url)));
        }
        if !self.load_time.is_zero() {
            tokio::time::sleep(self.load_time).await;
        }
        *lock(&self.url) = url.to_string();
        lock(&self.navigations).push(url.to_string());
        self.document().reset_scroll();
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(lock(&self.url).clone())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ScriptedElement>> {
        self.document().find_all(locator).await
    }

    async fn run_script(&self, code: &str) -> DriverResult<Value> {
        lock(&self.scripts).push(code.to_string());
        if code.contains(WINDOW_SCROLL) {
            self.document().scroll();
        }
        let target = lock(&self.redirects)
            .iter()
            .find(|(pattern, _)| code.contains(pattern.as_str()))
            .map(|(_, url)| url.clone());
        if let Some(url) = target {
            *lock(&self.url) = url;
        }
        Ok(Value::Null)
    }
}
