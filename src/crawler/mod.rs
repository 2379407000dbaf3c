//! Crawler module for profile sections, search results and event guests
//!
//! This module contains the core crawling logic, including:
//! - The browser session with its pacing and stop/pause control
//! - The pagination loop shared by every list crawl
//! - Per-entity extractors
//! - The gated crawl operations of [`Crawler`]

mod coordinator;
mod extractors;
mod items;
mod paginator;
mod session;

pub use coordinator::Crawler;
pub use extractors::{
    split_translation, AlbumPhotoExtractor, LinkExtractor, PersonExtractor, PhotoExtractor,
    PostExtractor,
};
pub use items::{AboutSection, Guest, GuestCategory, PageLink, Photo, Post, ProfileCard};
pub use paginator::{paginate, Extractor, ListScope};
pub use session::{optional, strip_css_url, CrawlSession, LoginForm};
