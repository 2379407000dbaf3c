use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Profile-Trawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub sections: SectionsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub locators: LocatorTable,
}

/// Crawl pacing and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum pause between paginated fetches (seconds)
    #[serde(rename = "min-delay")]
    pub min_delay: f64,

    /// Pause for the mean observed page-load time when it exceeds `min_delay`
    #[serde(rename = "dynamic-delay", default = "default_true")]
    pub dynamic_delay: bool,

    /// Upper bound on any single browser operation (seconds)
    #[serde(rename = "operation-timeout", default = "default_operation_timeout")]
    pub operation_timeout: f64,

    /// Attempts made when clicking a control that should change the page
    #[serde(rename = "click-retries", default = "default_click_retries")]
    pub click_retries: u32,

    /// Short pause after each of those attempts (seconds)
    #[serde(rename = "retry-wait", default = "default_retry_wait")]
    pub retry_wait: f64,

    /// Page holding the login form
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Base URL used to turn user names and IDs into profile URLs
    #[serde(rename = "profile-base-url")]
    pub profile_base_url: String,
}

impl CrawlerConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs_f64(self.min_delay)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.operation_timeout)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs_f64(self.retry_wait)
    }
}

fn default_true() -> bool {
    true
}

fn default_operation_timeout() -> f64 {
    60.0
}

fn default_click_retries() -> u32 {
    3
}

fn default_retry_wait() -> f64 {
    0.5
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for record files and albums
    pub directory: String,

    /// Folder naming pattern (supports %TARGET%, %TYPE%, %TIMESTAMP%)
    #[serde(rename = "folder-naming", default = "default_folder_naming")]
    pub folder_naming: String,

    /// File naming pattern (supports %TARGET%, %TYPE%, %TIMESTAMP%)
    #[serde(rename = "file-naming", default = "default_file_naming")]
    pub file_naming: String,

    /// Write a filename/description/permalink sidecar next to each album
    #[serde(rename = "photo-descriptions", default = "default_true")]
    pub photo_descriptions: bool,
}

pub const DEFAULT_FOLDER_NAMING: &str = "%TARGET%";
pub const DEFAULT_FILE_NAMING: &str = "%TIMESTAMP%-%TYPE%";

fn default_folder_naming() -> String {
    DEFAULT_FOLDER_NAMING.to_string()
}

fn default_file_naming() -> String {
    DEFAULT_FILE_NAMING.to_string()
}

/// Which profile sections a full scrape visits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SectionsConfig {
    #[serde(default = "default_true")]
    pub posts: bool,
    #[serde(default = "default_true")]
    pub friends: bool,
    #[serde(default = "default_true")]
    pub photos: bool,
    #[serde(default = "default_true")]
    pub likes: bool,
    #[serde(default = "default_true")]
    pub about: bool,
    #[serde(default = "default_true")]
    pub groups: bool,
    #[serde(default = "default_true")]
    pub checkins: bool,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        Self {
            posts: true,
            friends: true,
            photos: true,
            likes: true,
            about: true,
            groups: true,
            checkins: true,
        }
    }
}

/// Browser launch options
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chrome/Chromium binary; auto-detected when absent
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

/// Every locator and reference string the crawler needs from the target UI
///
/// All keys are required: a table missing one fails to load rather than
/// failing mid-crawl.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocatorTable {
    pub css: CssSelectors,
    pub xpath: XPathSelectors,
    pub pages: PageReferences,
    pub text: TextContent,
    pub attributes: AttributeNames,
}

/// CSS selectors keyed by semantic name
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CssSelectors {
    pub email_field: String,
    pub password_field: String,
    pub login_form: String,
    pub error_header: String,
    pub user_posts: String,
    pub see_more: String,
    pub translation: String,
    pub friends: String,
    pub friend_image: String,
    pub photos: String,
    pub photo_link: String,
    pub albums: String,
    pub album_photos: String,
    pub album_photo_image: String,
    pub album_video: String,
    pub about_links: String,
    pub about_main: String,
    pub groups: String,
    pub checkins: String,
    pub search_results: String,
    pub search_image: String,
    pub search_link: String,
    pub guest_categories: String,
    pub guest_scroller: String,
    pub guest_list: String,
    pub guest_image: String,
    pub dialog_close: String,
}

/// XPath selectors, used where CSS cannot express the relation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct XPathSelectors {
    pub friend_info: String,
    pub likes: String,
    pub post_date: String,
    pub date_link: String,
    pub translation_container: String,
    pub guest_info: String,
}

/// Query fragments that switch a profile to one of its sections
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PageReferences {
    pub friends: String,
    pub likes: String,
    pub photos: String,
    pub albums: String,
    pub about: String,
    pub groups: String,
    pub checkins: String,
}

/// Literal text matched against the page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TextContent {
    pub unavailable_banner: String,
    pub see_translation: String,
    pub see_original: String,
    pub hide_original: String,
}

/// Attribute names holding extracted values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AttributeNames {
    pub post_timestamp: String,
    pub photo_source: String,
    pub photo_description: String,
    pub about_title: String,
}

impl LocatorTable {
    /// Returns every (key, value) pair in the table, for validation
    pub fn entries(&self) -> Vec<(String, &str)> {
        let mut entries = Vec::new();
        for (key, value) in self.css.entries() {
            entries.push((format!("css.{}", key), value));
        }
        for (key, value) in self.xpath.entries() {
            entries.push((format!("xpath.{}", key), value));
        }
        for (key, value) in self.pages.entries() {
            entries.push((format!("pages.{}", key), value));
        }
        for (key, value) in self.text.entries() {
            entries.push((format!("text.{}", key), value));
        }
        for (key, value) in self.attributes.entries() {
            entries.push((format!("attributes.{}", key), value));
        }
        entries
    }
}

impl CssSelectors {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("email-field", &self.email_field),
            ("password-field", &self.password_field),
            ("login-form", &self.login_form),
            ("error-header", &self.error_header),
            ("user-posts", &self.user_posts),
            ("see-more", &self.see_more),
            ("translation", &self.translation),
            ("friends", &self.friends),
            ("friend-image", &self.friend_image),
            ("photos", &self.photos),
            ("photo-link", &self.photo_link),
            ("albums", &self.albums),
            ("album-photos", &self.album_photos),
            ("album-photo-image", &self.album_photo_image),
            ("album-video", &self.album_video),
            ("about-links", &self.about_links),
            ("about-main", &self.about_main),
            ("groups", &self.groups),
            ("checkins", &self.checkins),
            ("search-results", &self.search_results),
            ("search-image", &self.search_image),
            ("search-link", &self.search_link),
            ("guest-categories", &self.guest_categories),
            ("guest-scroller", &self.guest_scroller),
            ("guest-list", &self.guest_list),
            ("guest-image", &self.guest_image),
            ("dialog-close", &self.dialog_close),
        ]
    }
}

impl XPathSelectors {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("friend-info", &self.friend_info),
            ("likes", &self.likes),
            ("post-date", &self.post_date),
            ("date-link", &self.date_link),
            ("translation-container", &self.translation_container),
            ("guest-info", &self.guest_info),
        ]
    }
}

impl PageReferences {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("friends", &self.friends),
            ("likes", &self.likes),
            ("photos", &self.photos),
            ("albums", &self.albums),
            ("about", &self.about),
            ("groups", &self.groups),
            ("checkins", &self.checkins),
        ]
    }
}

impl TextContent {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("unavailable-banner", &self.unavailable_banner),
            ("see-translation", &self.see_translation),
            ("see-original", &self.see_original),
            ("hide-original", &self.hide_original),
        ]
    }
}

impl AttributeNames {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("post-timestamp", &self.post_timestamp),
            ("photo-source", &self.photo_source),
            ("photo-description", &self.photo_description),
            ("about-title", &self.about_title),
        ]
    }
}
