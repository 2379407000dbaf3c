//! Crawler coordinator - the crawl operations of a browser session
//!
//! Every public operation runs as the session's single active operation:
//! when another operation holds the session, or a stop is pending, it returns
//! `Ok(None)` without touching the browser. The ungated twins are used by
//! [`Scraper`](crate::Scraper), which wraps a whole target in one run.

use crate::config::{Config, LocatorTable};
use crate::crawler::extractors::{
    AlbumPhotoExtractor, LinkExtractor, PersonExtractor, PhotoExtractor, PostExtractor,
};
use crate::crawler::items::{AboutSection, Guest, GuestCategory, PageLink, Photo, Post, ProfileCard};
use crate::crawler::paginator::{paginate, Extractor, ListScope};
use crate::crawler::session::{optional, CrawlSession, LoginForm};
use crate::driver::{DriverResult, Locator, PageDriver};
use crate::state::{ControlState, Controller, StoppedCallback};
use crate::url::{join_query, target_url};
use std::future::Future;
use std::sync::Arc;

/// Crawl operations over one logged-in browser session
pub struct Crawler<D: PageDriver> {
    session: CrawlSession<D>,
    locators: LocatorTable,
    login_url: String,
    profile_base_url: String,
}

impl<D: PageDriver> Crawler<D> {
    pub fn new(driver: D, config: &Config) -> Self {
        Self {
            session: CrawlSession::new(driver, &config.crawler),
            locators: config.locators.clone(),
            login_url: config.crawler.login_url.clone(),
            profile_base_url: config.crawler.profile_base_url.clone(),
        }
    }

    pub fn session(&self) -> &CrawlSession<D> {
        &self.session
    }

    pub fn into_driver(self) -> D {
        self.session.into_driver()
    }

    /// Profile URL of a target given as an ID, a username or a URL
    pub fn target_url(&self, target: &str) -> String {
        target_url(&self.profile_base_url, target)
    }

    fn section_url(&self, target_url: &str, page: &str) -> String {
        join_query(target_url, page)
    }

    // Control

    pub fn control(&self) -> &Arc<Controller> {
        self.session.control()
    }

    pub fn status(&self) -> ControlState {
        self.control().status()
    }

    pub fn pause(&self) {
        self.control().pause();
    }

    pub fn unpause(&self) {
        self.control().unpause();
    }

    pub async fn interrupt(&self, on_stopped: Option<StoppedCallback>, restart: bool) {
        self.control().interrupt(on_stopped, restart).await;
    }

    pub fn restart(&self) {
        self.control().restart();
    }

    /// Runs `operation` exclusively; `Ok(None)` when it was not admitted
    pub(crate) async fn exclusive<T, F>(&self, operation: F) -> DriverResult<Option<T>>
    where
        F: Future<Output = DriverResult<T>>,
    {
        self.control().with_exclusive_run(operation).await.transpose()
    }

    // Gated operations

    /// Logs in; `Some(false)` when the browser stayed on the login page
    pub async fn login(&self, user: &str, password: &str) -> DriverResult<Option<bool>> {
        self.exclusive(self.sign_in(user, password)).await
    }

    /// Checks that a target's profile exists and is visible
    pub async fn is_valid_target(&self, target_url: &str) -> DriverResult<Option<bool>> {
        self.exclusive(self.check_target(target_url)).await
    }

    pub async fn crawl_posts<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(Post, usize),
    {
        self.exclusive(self.posts(target_url, on_item)).await
    }

    pub async fn crawl_friends<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(ProfileCard, usize),
    {
        self.exclusive(self.friends(target_url, on_item)).await
    }

    pub async fn crawl_likes<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(PageLink, usize),
    {
        self.exclusive(self.likes(target_url, on_item)).await
    }

    pub async fn crawl_photos<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(Photo, usize),
    {
        self.exclusive(self.photos(target_url, on_item)).await
    }

    pub async fn crawl_albums<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(PageLink, usize),
    {
        self.exclusive(self.albums(target_url, on_item)).await
    }

    pub async fn crawl_one_album<F>(&self, album_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(Photo, usize),
    {
        self.exclusive(self.album(album_url, on_item)).await
    }

    pub async fn crawl_about<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(AboutSection, usize),
    {
        self.exclusive(self.about(target_url, on_item)).await
    }

    pub async fn crawl_groups<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(PageLink, usize),
    {
        self.exclusive(self.groups(target_url, on_item)).await
    }

    pub async fn crawl_checkins<F>(&self, target_url: &str, on_item: F) -> DriverResult<Option<usize>>
    where
        F: FnMut(PageLink, usize),
    {
        self.exclusive(self.checkins(target_url, on_item)).await
    }

    /// Crawls a people-search result page; a `limit` of 0 is unlimited
    pub async fn crawl_search_results<F>(
        &self,
        url: &str,
        limit: usize,
        on_item: F,
    ) -> DriverResult<Option<usize>>
    where
        F: FnMut(ProfileCard, usize),
    {
        self.exclusive(self.search_results(url, limit, on_item)).await
    }

    /// Crawls the guest lists of an event, one category after another
    ///
    /// Sequence numbers continue across categories.
    pub async fn crawl_event_guests<F>(
        &self,
        event_url: &str,
        categories: &[GuestCategory],
        on_item: F,
    ) -> DriverResult<Option<usize>>
    where
        F: FnMut(Guest, usize),
    {
        self.exclusive(self.event_guests(event_url, categories, on_item)).await
    }

    // Ungated operations

    pub(crate) async fn sign_in(&self, user: &str, password: &str) -> DriverResult<bool> {
        let css = &self.locators.css;
        let form = LoginForm {
            email: &css.email_field,
            password: &css.password_field,
            form: &css.login_form,
        };
        let success = self.session.login(&self.login_url, &form, user, password).await?;
        if success {
            tracing::info!("Logged in as {}", user);
        } else {
            tracing::error!("Login failed for {}", user);
        }
        Ok(success)
    }

    pub(crate) async fn check_target(&self, target_url: &str) -> DriverResult<bool> {
        let banner = Locator::css(&self.locators.css.error_header);
        let valid = self
            .session
            .is_valid_target(target_url, &banner, &self.locators.text.unavailable_banner)
            .await?;
        if !valid {
            tracing::warn!("Target {} is not available", target_url);
        }
        Ok(valid)
    }

    pub(crate) async fn posts<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(Post, usize),
    {
        let locator = Locator::css(&self.locators.css.user_posts);
        let extractor = PostExtractor::new(&self.locators);
        self.list("posts", &ListScope::page(&locator, target_url), &extractor, on_item)
            .await
    }

    pub(crate) async fn friends<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(ProfileCard, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.friends);
        let locator = Locator::css(&self.locators.css.friends);
        let extractor = PersonExtractor::friends(&self.locators);
        self.list("friends", &ListScope::page(&locator, &url), &extractor, on_item)
            .await
    }

    pub(crate) async fn likes<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(PageLink, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.likes);
        let locator = Locator::xpath(&self.locators.xpath.likes);
        self.list("likes", &ListScope::page(&locator, &url), &LinkExtractor::new(), on_item)
            .await
    }

    pub(crate) async fn photos<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(Photo, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.photos);
        let locator = Locator::css(&self.locators.css.photos);
        let extractor = PhotoExtractor::new(&self.locators);
        self.list("photos", &ListScope::page(&locator, &url), &extractor, on_item)
            .await
    }

    /// Lists a target's albums
    ///
    /// The album grid is read once, without scrolling, and every link is
    /// collected before the first callback.
    pub(crate) async fn albums<F>(&self, target_url: &str, mut on_item: F) -> DriverResult<usize>
    where
        F: FnMut(PageLink, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.albums);
        self.session.load(&url, false, true).await?;

        let mut albums = Vec::new();
        let extractor = LinkExtractor::new();
        for element in self.session.find_all(&Locator::css(&self.locators.css.albums)).await? {
            match optional(extractor.extract(&self.session, &element).await)? {
                Some(album) => albums.push(album),
                None => tracing::warn!("Skipping unreadable album link"),
            }
        }

        let mut count = 0;
        for album in albums {
            if self.control().is_stop_requested() {
                break;
            }
            count += 1;
            tracing::info!("Album {}: {}", count, album.name);
            on_item(album, count);
        }
        Ok(count)
    }

    pub(crate) async fn album<F>(&self, album_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(Photo, usize),
    {
        let locator = Locator::css(&self.locators.css.album_photos);
        let extractor = AlbumPhotoExtractor::new(&self.locators);
        self.list("album photos", &ListScope::page(&locator, album_url), &extractor, on_item)
            .await
    }

    /// Reads each section of the about page
    pub(crate) async fn about<F>(&self, target_url: &str, mut on_item: F) -> DriverResult<usize>
    where
        F: FnMut(AboutSection, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.about);
        self.session.load(&url, false, true).await?;

        let links = self
            .session
            .find_all(&Locator::css(&self.locators.css.about_links))
            .await?;
        let main = Locator::css(&self.locators.css.about_main);

        let mut count = 0;
        for link in &links {
            if self.control().is_stop_requested() {
                break;
            }
            let section = optional(self.about_section(link, &main).await)?;
            match section {
                Some(section) => {
                    count += 1;
                    tracing::info!("About section {}: {}", count, section.title);
                    on_item(section, count);
                }
                None => tracing::warn!("Skipping unreadable about section"),
            }
        }
        Ok(count)
    }

    async fn about_section(&self, link: &D::Element, main: &Locator) -> DriverResult<AboutSection> {
        self.session.click(link).await?;
        self.session.wait(1.0).await;

        let title = self
            .session
            .attribute(link, &self.locators.attributes.about_title)
            .await?
            .unwrap_or_default();
        let text = match self.session.find_one(main).await? {
            Some(pane) => self.session.text(&pane).await?,
            None => String::new(),
        };
        Ok(AboutSection { title, text })
    }

    pub(crate) async fn groups<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(PageLink, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.groups);
        let locator = Locator::css(&self.locators.css.groups);
        self.list("groups", &ListScope::page(&locator, &url), &LinkExtractor::new(), on_item)
            .await
    }

    pub(crate) async fn checkins<F>(&self, target_url: &str, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(PageLink, usize),
    {
        let url = self.section_url(target_url, &self.locators.pages.checkins);
        let locator = Locator::css(&self.locators.css.checkins);
        self.list("check-ins", &ListScope::page(&locator, &url), &LinkExtractor::new(), on_item)
            .await
    }

    pub(crate) async fn search_results<F>(&self, url: &str, limit: usize, on_item: F) -> DriverResult<usize>
    where
        F: FnMut(ProfileCard, usize),
    {
        let locator = Locator::css(&self.locators.css.search_results);
        let extractor = PersonExtractor::search_results(&self.locators);
        let scope = ListScope::page(&locator, url).with_limit(limit);
        self.list("search results", &scope, &extractor, on_item).await
    }

    pub(crate) async fn event_guests<F>(
        &self,
        event_url: &str,
        categories: &[GuestCategory],
        mut on_item: F,
    ) -> DriverResult<usize>
    where
        F: FnMut(Guest, usize),
    {
        let css = &self.locators.css;
        self.session.load(event_url, false, true).await?;

        let list = Locator::css(&css.guest_list);
        let extractor = PersonExtractor::guests(&self.locators);
        let mut total = 0;

        for &category in categories {
            if self.control().is_stop_requested() {
                break;
            }

            let Some(link) = self.category_link(category).await? else {
                tracing::warn!("No {} guest list on {}", category, event_url);
                continue;
            };
            self.session.click(&link).await?;
            self.session.wait(1.0).await;

            let Some(scroller) = self.session.find_one(&Locator::css(&css.guest_scroller)).await? else {
                tracing::warn!("The {} guest dialog did not open", category);
                continue;
            };

            let offset = total;
            let count = paginate(
                &self.session,
                &ListScope::region(&list, &scroller),
                &extractor,
                |person, seq| on_item(Guest { category, person }, offset + seq),
            )
            .await?;
            tracing::info!("Found {} {} guests", count, category);
            total += count;

            if let Some(close) = self.session.find_one(&Locator::css(&css.dialog_close)).await? {
                optional(self.session.click(&close).await)?;
                self.session.wait(0.5).await;
            }
        }

        Ok(total)
    }

    async fn category_link(&self, category: GuestCategory) -> DriverResult<Option<D::Element>> {
        let label = category.label().to_lowercase();
        let links = self
            .session
            .find_all(&Locator::css(&self.locators.css.guest_categories))
            .await?;
        for link in links {
            if let Some(text) = optional(self.session.text(&link).await)? {
                if text.to_lowercase().contains(&label) {
                    return Ok(Some(link));
                }
            }
        }
        Ok(None)
    }

    async fn list<X, F>(
        &self,
        name: &str,
        scope: &ListScope<'_, D::Element>,
        extractor: &X,
        on_item: F,
    ) -> DriverResult<usize>
    where
        X: Extractor<D>,
        F: FnMut(X::Item, usize),
    {
        tracing::info!("Crawling {}", name);
        let count = paginate(&self.session, scope, extractor, on_item).await?;
        tracing::info!("Found {} {}", count, name);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::driver::scripted::{ClickAction, ScriptedDriver, ScriptedElement};
    use crate::driver::DriverError;

    const EXAMPLE: &str = include_str!("../../trawler.example.toml");
    const TARGET: &str = "https://www.facebook.com/jane.doe";

    fn config() -> Config {
        parse_config(EXAMPLE).unwrap()
    }

    fn link(text: &str, href: &str) -> ScriptedElement {
        ScriptedElement::new(text).with_attribute("href", href)
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_refused_while_running() {
        let config = config();
        let url = join_query(TARGET, &config.locators.pages.friends);
        let page = ScriptedElement::new("").with_children(
            Locator::css(&config.locators.css.friends),
            vec![ScriptedElement::new("Someone")],
        );
        let crawler = Crawler::new(ScriptedDriver::new().with_page(&url, page), &config);

        let guard = crawler.control().begin().unwrap();
        let mut calls = 0;
        let result = crawler.crawl_friends(TARGET, |_, _| calls += 1).await.unwrap();
        drop(guard);

        assert_eq!(result, None);
        assert_eq!(calls, 0);
        assert!(crawler.session().driver().navigations().is_empty());
        assert_eq!(crawler.status(), ControlState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_propagates_and_releases() {
        let config = config();
        let url = join_query(TARGET, &config.locators.pages.friends);
        let crawler = Crawler::new(ScriptedDriver::new().fail_navigation(&url), &config);

        let err = crawler.crawl_friends(TARGET, |_, _| {}).await.unwrap_err();

        assert!(matches!(err, DriverError::Navigation(_)));
        assert_eq!(crawler.status(), ControlState::Ready);
        assert!(crawler.crawl_friends(TARGET, |_, _| {}).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_likes() {
        let config = config();
        let url = join_query(TARGET, &config.locators.pages.likes);
        let page = ScriptedElement::new("").with_children(
            Locator::xpath(&config.locators.xpath.likes),
            vec![
                link("Rust", "https://www.facebook.com/rustlang"),
                link("Tokio", "https://www.facebook.com/tokio"),
            ],
        );
        let crawler = Crawler::new(ScriptedDriver::new().with_page(&url, page), &config);

        let mut likes = Vec::new();
        let count = crawler
            .crawl_likes(TARGET, |like, seq| likes.push((seq, like.name)))
            .await
            .unwrap();

        assert_eq!(count, Some(2));
        assert_eq!(likes, vec![(1, "Rust".to_string()), (2, "Tokio".to_string())]);
        assert_eq!(crawler.status(), ControlState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_albums_lists_links() {
        let config = config();
        let url = join_query(TARGET, &config.locators.pages.albums);
        let page = ScriptedElement::new("").with_children(
            Locator::css(&config.locators.css.albums),
            vec![
                link("Holidays", "https://www.facebook.com/media/set/?set=a.1"),
                link("Profile Pictures", "https://www.facebook.com/media/set/?set=a.2"),
            ],
        );
        let crawler = Crawler::new(ScriptedDriver::new().with_page(&url, page), &config);

        let mut albums = Vec::new();
        let count = crawler
            .crawl_albums(TARGET, |album, seq| albums.push((seq, album)))
            .await
            .unwrap();

        assert_eq!(count, Some(2));
        assert_eq!(albums[1].0, 2);
        assert_eq!(albums[1].1.url, "https://www.facebook.com/media/set/?set=a.2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_about() {
        let config = config();
        let locators = &config.locators;
        let url = join_query(TARGET, &locators.pages.about);

        let pane = ScriptedElement::new("");
        let section = |title: &str, text: &str| {
            ScriptedElement::new(title)
                .with_attribute(&locators.attributes.about_title, title)
                .on_click(ClickAction::SetText {
                    target: pane.clone(),
                    text: text.to_string(),
                })
        };
        let page = ScriptedElement::new("")
            .with_children(
                Locator::css(&locators.css.about_links),
                vec![
                    section("Work and Education", "Works at Example Ltd"),
                    section("Places He's Lived", "Lives in Lisbon"),
                ],
            )
            .with_children(Locator::css(&locators.css.about_main), vec![pane.clone()]);
        let crawler = Crawler::new(ScriptedDriver::new().with_page(&url, page), &config);

        let mut sections = Vec::new();
        let count = crawler
            .crawl_about(TARGET, |section, _| sections.push(section))
            .await
            .unwrap();

        assert_eq!(count, Some(2));
        assert_eq!(
            sections[1],
            AboutSection {
                title: "Places He's Lived".to_string(),
                text: "Lives in Lisbon".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_limit() {
        let config = config();
        let locators = &config.locators;
        let url = "https://www.facebook.com/search/str/kim/users-named";
        let results: Vec<_> = (1..=8)
            .map(|i| {
                ScriptedElement::new("").with_children(
                    Locator::css(&locators.css.search_link),
                    vec![link(&format!("Kim {}", i), &format!("https://www.facebook.com/kim{}", i))],
                )
            })
            .collect();
        let page =
            ScriptedElement::new("").with_children(Locator::css(&locators.css.search_results), results);
        let crawler = Crawler::new(ScriptedDriver::new().with_page(url, page), &config);

        let mut names = Vec::new();
        let count = crawler
            .crawl_search_results(url, 5, |person, _| names.push(person.name))
            .await
            .unwrap();

        assert_eq!(count, Some(5));
        assert_eq!(names.last().map(String::as_str), Some("Kim 5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_guests_numbered_across_categories() {
        let config = config();
        let css = &config.locators.css;
        let url = "https://www.facebook.com/events/42/";
        let page = ScriptedElement::new("");
        let scroller_locator = Locator::css(&css.guest_scroller);

        let dialog = |names: &[&str]| {
            let rows = names
                .iter()
                .map(|name| {
                    ScriptedElement::new(*name).with_children(
                        Locator::xpath(&config.locators.xpath.guest_info),
                        vec![link(name, &format!("https://www.facebook.com/{}", name))],
                    )
                })
                .collect();
            ScriptedElement::new("").with_children(Locator::css(&css.guest_list), rows)
        };
        let opens = |scroller: ScriptedElement| ClickAction::AddChild {
            target: page.clone(),
            locator: scroller_locator.clone(),
            child: scroller,
        };

        let going = ScriptedElement::new("12 Going").on_click(opens(dialog(&["ana", "ben"][..])));
        let invited = ScriptedElement::new("3 Invited").on_click(opens(dialog(&["cleo"][..])));
        let close = ScriptedElement::new("Close").on_click(ClickAction::ClearChildren {
            target: page.clone(),
            locator: scroller_locator.clone(),
        });
        let page = page
            .with_children(Locator::css(&css.guest_categories), vec![going, invited])
            .with_children(Locator::css(&css.dialog_close), vec![close]);
        let crawler = Crawler::new(ScriptedDriver::new().with_page(url, page), &config);

        let mut guests = Vec::new();
        let count = crawler
            .crawl_event_guests(url, &GuestCategory::ALL, |guest, seq| {
                guests.push((seq, guest.category, guest.person.name))
            })
            .await
            .unwrap();

        assert_eq!(count, Some(3));
        assert_eq!(
            guests,
            vec![
                (1, GuestCategory::Going, "ana".to_string()),
                (2, GuestCategory::Going, "ben".to_string()),
                (3, GuestCategory::Invited, "cleo".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_and_target_check() {
        let config = config();
        let unavailable = ScriptedElement::new("").with_children(
            Locator::css(&config.locators.css.error_header),
            vec![ScriptedElement::new("This page isn't available")],
        );
        let driver = ScriptedDriver::new()
            .redirect_on_script(".submit()", "https://www.facebook.com/")
            .with_page("https://www.facebook.com/ghost", unavailable);
        let crawler = Crawler::new(driver, &config);

        assert_eq!(crawler.login("jane@example.com", "hunter2").await.unwrap(), Some(true));
        assert_eq!(
            crawler.is_valid_target(&crawler.target_url("ghost")).await.unwrap(),
            Some(false)
        );
    }
}
