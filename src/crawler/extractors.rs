//! Per-entity extractors
//!
//! Each extractor reads one list element. Optional parts of an entity
//! (images, timestamps, translations) degrade to empty values when their
//! elements are missing; a missing primary element fails the extraction
//! with `ElementNotFound`, which skips the element.

use crate::config::LocatorTable;
use crate::crawler::items::{PageLink, Photo, Post, ProfileCard};
use crate::crawler::paginator::Extractor;
use crate::crawler::session::optional;
use crate::crawler::CrawlSession;
use crate::driver::{DriverError, DriverResult, Locator, PageDriver};
use async_trait::async_trait;
use std::collections::HashSet;

/// Splits the text of a post that showed a translation by default
///
/// `before` is the text as first shown (the translation), `after` the text
/// once the original was revealed. Lines that only appear in `after` form the
/// original. Affordance labels such as "See original" are dropped. Returns
/// `(original, translation)`; when nothing new appeared the shown text is
/// returned as the original with an empty translation.
pub fn split_translation(before: &str, after: &str, labels: &[&str]) -> (String, String) {
    let is_label = |line: &str| labels.iter().any(|label| line.trim().eq_ignore_ascii_case(label));

    let shown: HashSet<&str> = before.lines().map(str::trim).collect();
    let translation: Vec<&str> = before.lines().filter(|line| !is_label(line)).collect();
    let original: Vec<&str> = after
        .lines()
        .filter(|line| !is_label(line) && !shown.contains(line.trim()))
        .collect();

    if original.iter().all(|line| line.trim().is_empty()) {
        (translation.join("\n"), String::new())
    } else {
        (original.join("\n"), translation.join("\n"))
    }
}

/// Timeline posts
pub struct PostExtractor<'a> {
    locators: &'a LocatorTable,
}

impl<'a> PostExtractor<'a> {
    pub fn new(locators: &'a LocatorTable) -> Self {
        Self { locators }
    }

    /// Reveals the post's translation; returns `(text, translation)`
    async fn translate<D: PageDriver>(
        &self,
        session: &CrawlSession<D>,
        post: &D::Element,
        text: String,
    ) -> DriverResult<(String, String)> {
        let labels = &self.locators.text;

        let see_translation = Locator::link_text(&labels.see_translation);
        if let Some(link) = session.find_one_in(post, &see_translation).await? {
            let container = session
                .require_in(&link, &Locator::xpath(&self.locators.xpath.translation_container))
                .await?;
            let translation = match session
                .reveal(&link, &container, &Locator::css(&self.locators.css.translation))
                .await?
            {
                Some(revealed) => session.text(&revealed).await?,
                None => {
                    tracing::debug!("Translation panel never appeared");
                    String::new()
                }
            };
            return Ok((text, translation));
        }

        let see_original = Locator::link_text(&labels.see_original);
        if let Some(link) = session.find_one_in(post, &see_original).await? {
            session.force_click(post, &link).await?;
            let after = session.text(post).await?;
            return Ok(split_translation(
                &text,
                &after,
                &[labels.see_original.as_str(), labels.hide_original.as_str()],
            ));
        }

        Ok((text, String::new()))
    }
}

#[async_trait]
impl<D: PageDriver> Extractor<D> for PostExtractor<'_> {
    type Item = Post;

    async fn extract(&self, session: &CrawlSession<D>, post: &D::Element) -> DriverResult<Post> {
        let see_more = Locator::css(&self.locators.css.see_more);
        if let Some(link) = optional(session.find_one_in(post, &see_more).await)?.flatten() {
            if !session.force_click(post, &link).await? {
                tracing::debug!("\"See more\" did not expand the post");
            }
        }

        // Read before the translation is revealed, which appends to the post text
        let text = session.text(post).await?;

        let (text, translation) = match self.translate(session, post, text.clone()).await {
            Ok(translated) => translated,
            Err(e) if e.is_soft() => {
                tracing::warn!("Translation unavailable: {}", e);
                (text, String::new())
            }
            Err(e) => return Err(e),
        };

        let mut timestamp = None;
        let mut permalink = None;
        let post_date = Locator::xpath(&self.locators.xpath.post_date);
        if let Some(date) = optional(session.find_one_in(post, &post_date).await)?.flatten() {
            timestamp = optional(
                session
                    .attribute(&date, &self.locators.attributes.post_timestamp)
                    .await,
            )?
            .flatten()
            .and_then(|value| value.trim().parse::<i64>().ok());

            let date_link = Locator::xpath(&self.locators.xpath.date_link);
            if let Some(anchor) = optional(session.find_one_in(&date, &date_link).await)?.flatten() {
                permalink = optional(session.attribute(&anchor, "href").await)?.flatten();
            }
        }

        Ok(Post {
            timestamp,
            text,
            translation,
            permalink,
        })
    }
}

/// People: friends, search results and event guests
pub struct PersonExtractor {
    link: Locator,
    image: Locator,
}

impl PersonExtractor {
    pub fn new(link: Locator, image: Locator) -> Self {
        Self { link, image }
    }

    pub fn friends(locators: &LocatorTable) -> Self {
        Self::new(
            Locator::xpath(&locators.xpath.friend_info),
            Locator::css(&locators.css.friend_image),
        )
    }

    pub fn search_results(locators: &LocatorTable) -> Self {
        Self::new(
            Locator::css(&locators.css.search_link),
            Locator::css(&locators.css.search_image),
        )
    }

    pub fn guests(locators: &LocatorTable) -> Self {
        Self::new(
            Locator::xpath(&locators.xpath.guest_info),
            Locator::css(&locators.css.guest_image),
        )
    }
}

#[async_trait]
impl<D: PageDriver> Extractor<D> for PersonExtractor {
    type Item = ProfileCard;

    async fn extract(&self, session: &CrawlSession<D>, element: &D::Element) -> DriverResult<ProfileCard> {
        let link = session.require_in(element, &self.link).await?;
        let name = session.text(&link).await?.trim().to_string();
        let profile_url = session.attribute(&link, "href").await?.unwrap_or_default();

        let image_url = match optional(session.find_one_in(element, &self.image).await)?.flatten() {
            Some(image) => optional(session.attribute(&image, "src").await)?.flatten(),
            None => None,
        };

        Ok(ProfileCard {
            name,
            profile_url,
            image_url,
        })
    }
}

/// Named links: likes, groups, check-ins and albums
#[derive(Default)]
pub struct LinkExtractor {
    nested: Option<Locator>,
}

impl LinkExtractor {
    /// Reads the list element itself
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the first `nested` element inside the list element
    pub fn nested(locator: Locator) -> Self {
        Self {
            nested: Some(locator),
        }
    }
}

#[async_trait]
impl<D: PageDriver> Extractor<D> for LinkExtractor {
    type Item = PageLink;

    async fn extract(&self, session: &CrawlSession<D>, element: &D::Element) -> DriverResult<PageLink> {
        let nested = match &self.nested {
            Some(locator) => Some(session.require_in(element, locator).await?),
            None => None,
        };
        let link = nested.as_ref().unwrap_or(element);

        Ok(PageLink {
            name: session.text(link).await?.trim().to_string(),
            url: session.attribute(link, "href").await?.unwrap_or_default(),
        })
    }
}

/// Photos of the photos page
pub struct PhotoExtractor<'a> {
    locators: &'a LocatorTable,
}

impl<'a> PhotoExtractor<'a> {
    pub fn new(locators: &'a LocatorTable) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl<D: PageDriver> Extractor<D> for PhotoExtractor<'_> {
    type Item = Photo;

    async fn extract(&self, session: &CrawlSession<D>, element: &D::Element) -> DriverResult<Photo> {
        let attributes = &self.locators.attributes;
        let source_url = session
            .attribute(element, &attributes.photo_source)
            .await?
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DriverError::ElementNotFound(format!("photo without {}", attributes.photo_source)))?;

        let mut description = String::new();
        let mut permalink = String::new();
        let photo_link = Locator::css(&self.locators.css.photo_link);
        if let Some(link) = optional(session.find_one_in(element, &photo_link).await)?.flatten() {
            description = session
                .attribute(&link, &attributes.photo_description)
                .await?
                .unwrap_or_default();
            permalink = session.attribute(&link, "href").await?.unwrap_or_default();
        }

        Ok(Photo {
            source_url,
            description,
            permalink,
        })
    }
}

/// Photos inside an album, where videos only show a background-image placeholder
pub struct AlbumPhotoExtractor<'a> {
    locators: &'a LocatorTable,
}

impl<'a> AlbumPhotoExtractor<'a> {
    pub fn new(locators: &'a LocatorTable) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl<D: PageDriver> Extractor<D> for AlbumPhotoExtractor<'_> {
    type Item = Photo;

    async fn extract(&self, session: &CrawlSession<D>, element: &D::Element) -> DriverResult<Photo> {
        let css = &self.locators.css;

        let image = Locator::css(&css.album_photo_image);
        let mut source_url = match session.find_one_in(element, &image).await? {
            Some(img) => session.attribute(&img, "src").await?.filter(|src| !src.is_empty()),
            None => None,
        };
        if source_url.is_none() {
            let video = Locator::css(&css.album_video);
            if let Some(placeholder) = session.find_one_in(element, &video).await? {
                source_url = session.background_image_url(&placeholder).await?;
            }
        }
        let source_url =
            source_url.ok_or_else(|| DriverError::ElementNotFound("album photo source".to_string()))?;

        let description = session
            .attribute(element, &self.locators.attributes.photo_description)
            .await?
            .unwrap_or_default();
        let permalink = session.attribute(element, "href").await?.unwrap_or_default();

        Ok(Photo {
            source_url,
            description,
            permalink,
        })
    }
}
