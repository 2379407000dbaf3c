//! Per-target scraping into record files and photo albums
//!
//! A [`Scraper`] resolves a target, checks that its profile is available and
//! crawls every enabled section, in a fixed order, as one exclusive run.
//! Records are written as they are delivered, so a stopped scrape leaves
//! every item crawled so far on disk.

use crate::config::{Config, SectionsConfig};
use crate::crawler::{Crawler, GuestCategory, PageLink, Photo};
use crate::driver::PageDriver;
use crate::output::{Album, OutputError, OutputNaming, OutputResult, RecordWriter};
use crate::url::{format_unix_time, path_safe, strip_query, target_name};
use crate::Result;
use reqwest::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Profile sections, in the order they are scraped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Posts,
    Friends,
    Photos,
    Albums,
    Likes,
    About,
    Groups,
    Checkins,
}

impl Section {
    pub const ORDER: [Section; 8] = [
        Self::Posts,
        Self::Friends,
        Self::Photos,
        Self::Albums,
        Self::Likes,
        Self::About,
        Self::Groups,
        Self::Checkins,
    ];

    /// Name used for the `%TYPE%` of the section's output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Friends => "friends",
            Self::Photos => "photos",
            Self::Albums => "albums",
            Self::Likes => "likes",
            Self::About => "about",
            Self::Groups => "groups",
            Self::Checkins => "checkins",
        }
    }

    /// Albums follow the photos switch
    pub fn is_enabled(&self, sections: &SectionsConfig) -> bool {
        match self {
            Self::Posts => sections.posts,
            Self::Friends => sections.friends,
            Self::Photos | Self::Albums => sections.photos,
            Self::Likes => sections.likes,
            Self::About => sections.about,
            Self::Groups => sections.groups,
            Self::Checkins => sections.checkins,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one target's scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    /// Identifier the output is named after
    pub target: String,
    pub target_url: String,
    /// False when the profile was unavailable; nothing was written
    pub valid: bool,
    /// Items delivered per section; for albums, the number of albums
    pub counts: BTreeMap<Section, usize>,
    /// Image URLs whose download failed
    pub broken_images: Vec<String>,
    /// True when a stop request cut the scrape short
    pub stopped: bool,
}

impl ScrapeReport {
    fn new(target: String, target_url: String) -> Self {
        Self {
            target,
            target_url,
            valid: false,
            counts: BTreeMap::new(),
            broken_images: Vec::new(),
            stopped: false,
        }
    }

    pub fn count(&self, section: Section) -> usize {
        self.counts.get(&section).copied().unwrap_or(0)
    }
}

/// A record file fed from crawl callbacks
///
/// The first write failure is kept and later records are dropped; the
/// failure is returned by `finish` once the crawl has returned.
struct RecordSink {
    writer: RecordWriter,
    failure: Option<OutputError>,
}

impl RecordSink {
    fn create(base: &Path, header: &[&str]) -> OutputResult<Self> {
        Ok(Self {
            writer: RecordWriter::create(base, header)?,
            failure: None,
        })
    }

    fn add<I, T>(&mut self, record: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.writer.add(record) {
            tracing::error!("Failed to write to {}: {}", self.writer.path().display(), e);
            self.failure = Some(e);
        }
    }

    fn finish(self) -> OutputResult<usize> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.writer.rows()),
        }
    }
}

/// An album fed from crawl callbacks, with the failure handling of [`RecordSink`]
struct AlbumSink {
    album: Album,
    failure: Option<OutputError>,
}

impl AlbumSink {
    fn add(&mut self, photo: &Photo, seq: usize) {
        if self.failure.is_some() {
            return;
        }
        match self
            .album
            .add_photo(&photo.source_url, &photo.description, &photo.permalink)
        {
            Ok(()) => tracing::info!("Scraped photo {}: {}", seq, photo.source_url),
            Err(e) => {
                tracing::error!("Failed to record photo {}: {}", seq, e);
                self.failure = Some(e);
            }
        }
    }

    /// Waits for the downloads and adds the broken images to `report`
    async fn finish(self, photos: usize, report: &mut ScrapeReport) -> OutputResult<()> {
        if let Some(e) = self.failure {
            return Err(e);
        }
        let directory = self.album.directory().to_path_buf();
        let outcome = self.album.finish().await?;
        tracing::info!(
            "Saved {} of {} photos into {}",
            outcome.saved,
            photos,
            directory.display()
        );
        report.broken_images.extend(outcome.broken);
        Ok(())
    }
}

/// Scrapes targets into the configured output directory
pub struct Scraper<D: PageDriver> {
    crawler: Crawler<D>,
    naming: OutputNaming,
    sections: SectionsConfig,
    photo_descriptions: bool,
    client: Client,
}

impl<D: PageDriver> Scraper<D> {
    /// `client` downloads album images
    pub fn new(driver: D, config: &Config, client: Client) -> Self {
        Self {
            crawler: Crawler::new(driver, config),
            naming: OutputNaming::from_config(&config.output),
            sections: config.sections.clone(),
            photo_descriptions: config.output.photo_descriptions,
            client,
        }
    }

    pub fn crawler(&self) -> &Crawler<D> {
        &self.crawler
    }

    pub fn into_driver(self) -> D {
        self.crawler.into_driver()
    }

    /// Logs in; `Ok(None)` when another operation holds the session
    pub async fn login(&self, user: &str, password: &str) -> Result<Option<bool>> {
        Ok(self.crawler.login(user, password).await?)
    }

    /// Scrapes every enabled section of `target`
    ///
    /// `target` is an ID, a user name or a profile URL. Returns `Ok(None)`
    /// when the scrape was not admitted.
    pub async fn scrape(&self, target: &str) -> Result<Option<ScrapeReport>> {
        self.crawler
            .control()
            .with_exclusive_run(self.scrape_target(target))
            .await
            .transpose()
    }

    /// Scrapes a people-search result page into a `search` record file
    pub async fn search(&self, url: &str, limit: usize) -> Result<Option<usize>> {
        self.crawler
            .control()
            .with_exclusive_run(self.scrape_search(url, limit))
            .await
            .transpose()
    }

    /// Scrapes the guest lists of an event into a `guests` record file
    pub async fn event(&self, url: &str, categories: &[GuestCategory]) -> Result<Option<usize>> {
        self.crawler
            .control()
            .with_exclusive_run(self.scrape_event(url, categories))
            .await
            .transpose()
    }

    async fn scrape_target(&self, target: &str) -> Result<ScrapeReport> {
        let url = self.crawler.target_url(target);
        let mut report = ScrapeReport::new(target_name(&url), url);

        if !self.crawler.check_target(&report.target_url).await? {
            tracing::info!("{} is not a valid target", report.target_url);
            return Ok(report);
        }
        report.valid = true;
        tracing::info!("Scraping user {} at URL: {}", report.target, report.target_url);

        for section in Section::ORDER {
            if self.crawler.control().is_stop_requested() {
                report.stopped = true;
                break;
            }
            if !section.is_enabled(&self.sections) {
                continue;
            }

            let count = match section {
                Section::Posts => self.scrape_posts(&report).await?,
                Section::Friends => self.scrape_friends(&report).await?,
                Section::Photos => self.scrape_photos(&mut report).await?,
                Section::Albums => self.scrape_albums(&mut report).await?,
                Section::Likes | Section::Groups | Section::Checkins => {
                    self.scrape_links(&report, section).await?
                }
                Section::About => self.scrape_about(&report).await?,
            };
            report.counts.insert(section, count);
        }

        report.stopped |= self.crawler.control().is_stop_requested();
        tracing::info!("Finished scraping user {}", report.target);
        Ok(report)
    }

    async fn scrape_posts(&self, report: &ScrapeReport) -> Result<usize> {
        let base = self.naming.output_path(&report.target, Section::Posts.as_str());
        let mut sink = RecordSink::create(&base, &["date", "post", "translation", "permalink"])?;
        tracing::info!("Scraping posts into {}", sink.writer.path().display());

        self.crawler
            .posts(&report.target_url, |post, seq| {
                let date = post.timestamp.and_then(format_unix_time).unwrap_or_default();
                sink.add([
                    date.as_str(),
                    post.text.as_str(),
                    post.translation.as_str(),
                    post.permalink.as_deref().unwrap_or_default(),
                ]);
                tracing::info!("Scraped post {}", seq);
                tracing::debug!("Post {}:\n{}", seq, post.text);
            })
            .await?;

        Ok(sink.finish()?)
    }

    async fn scrape_friends(&self, report: &ScrapeReport) -> Result<usize> {
        let base = self.naming.output_path(&report.target, Section::Friends.as_str());
        let mut sink = RecordSink::create(&base, &["name", "profile", "image"])?;

        self.crawler
            .friends(&report.target_url, |friend, seq| {
                let profile = strip_query(&friend.profile_url);
                sink.add([
                    friend.name.as_str(),
                    profile.as_str(),
                    friend.image_url.as_deref().unwrap_or_default(),
                ]);
                tracing::info!("Scraped friend {}: {}", seq, friend.name);
            })
            .await?;

        Ok(sink.finish()?)
    }

    async fn scrape_links(&self, report: &ScrapeReport, section: Section) -> Result<usize> {
        let base = self.naming.output_path(&report.target, section.as_str());
        let mut sink = RecordSink::create(&base, &["name", "url"])?;

        let on_item = |link: PageLink, seq: usize| {
            sink.add([link.name.as_str(), link.url.as_str()]);
            tracing::info!("Scraped {} {}: {}", section, seq, link.name);
        };
        match section {
            Section::Likes => self.crawler.likes(&report.target_url, on_item).await?,
            Section::Groups => self.crawler.groups(&report.target_url, on_item).await?,
            _ => self.crawler.checkins(&report.target_url, on_item).await?,
        };

        Ok(sink.finish()?)
    }

    async fn scrape_about(&self, report: &ScrapeReport) -> Result<usize> {
        let base = self.naming.output_path(&report.target, Section::About.as_str());
        let mut sink = RecordSink::create(&base, &["section", "text"])?;

        self.crawler
            .about(&report.target_url, |section, _| {
                sink.add([section.title.as_str(), section.text.as_str()]);
                tracing::info!("Scraped about section {}", section.title);
            })
            .await?;

        Ok(sink.finish()?)
    }

    /// Downloads the photos page into a `photos` album
    async fn scrape_photos(&self, report: &mut ScrapeReport) -> Result<usize> {
        let directory = self.naming.output_path(&report.target, Section::Photos.as_str());
        let mut sink = self.album(&directory)?;

        let count = self
            .crawler
            .photos(&report.target_url, |photo, seq| sink.add(&photo, seq))
            .await?;

        sink.finish(count, report).await?;
        Ok(count)
    }

    /// Downloads each album into its own `album-<name>` album
    async fn scrape_albums(&self, report: &mut ScrapeReport) -> Result<usize> {
        let mut albums = Vec::new();
        self.crawler
            .albums(&report.target_url, |album, _| albums.push(album))
            .await?;

        let mut count = 0;
        for album in albums {
            if self.crawler.control().is_stop_requested() {
                break;
            }
            let kind = format!("album-{}", path_safe(&album.name));
            let directory = self.naming.output_path(&report.target, &kind);
            let mut sink = self.album(&directory)?;

            let photos = self
                .crawler
                .album(&album.url, |photo, seq| sink.add(&photo, seq))
                .await?;

            sink.finish(photos, report).await?;
            count += 1;
        }
        Ok(count)
    }

    fn album(&self, directory: &Path) -> OutputResult<AlbumSink> {
        tracing::info!("Scraping photos into {}", directory.display());
        Ok(AlbumSink {
            album: Album::create(directory, self.photo_descriptions, self.client.clone())?,
            failure: None,
        })
    }

    async fn scrape_search(&self, url: &str, limit: usize) -> Result<usize> {
        let base = self.naming.output_path("search", "search-results");
        let mut sink = RecordSink::create(&base, &["name", "profile", "image"])?;
        tracing::info!("Scraping search results of {} into {}", url, sink.writer.path().display());

        self.crawler
            .search_results(url, limit, |person, seq| {
                sink.add([
                    person.name.as_str(),
                    person.profile_url.as_str(),
                    person.image_url.as_deref().unwrap_or_default(),
                ]);
                tracing::info!("Scraped search result {}: {}", seq, person.name);
            })
            .await?;

        Ok(sink.finish()?)
    }

    async fn scrape_event(&self, url: &str, categories: &[GuestCategory]) -> Result<usize> {
        let base = self.naming.output_path(&target_name(url), "guests");
        let mut sink = RecordSink::create(&base, &["category", "name", "profile", "image"])?;
        tracing::info!("Scraping event guests of {} into {}", url, sink.writer.path().display());

        self.crawler
            .event_guests(url, categories, |guest, seq| {
                sink.add([
                    guest.category.as_str(),
                    guest.person.name.as_str(),
                    guest.person.profile_url.as_str(),
                    guest.person.image_url.as_deref().unwrap_or_default(),
                ]);
                tracing::info!("Scraped {} guest {}: {}", guest.category, seq, guest.person.name);
            })
            .await?;

        Ok(sink.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_albums_follow_photos_switch() {
        let mut sections = parse_config(include_str!("../trawler.example.toml"))
            .unwrap()
            .sections;
        sections.photos = false;
        assert!(!Section::Albums.is_enabled(&sections));
        assert!(Section::Friends.is_enabled(&sections));
        assert_eq!(Section::Checkins.to_string(), "checkins");
    }

    #[test]
    fn test_record_sink_keeps_first_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = RecordSink::create(&dir.path().join("likes"), &["name", "url"]).unwrap();
        sink.add(["Rust", "https://example.com/rust"]);
        sink.add(["only one field"]);
        sink.add(["Tokio", "https://example.com/tokio"]);
        assert!(matches!(sink.finish(), Err(OutputError::Csv(_))));
    }
}
