//! Profile-Trawler: a paced, interruptible profile crawler
//!
//! This crate drives a real browser through a target's profile sections
//! (posts, friends, photos, likes, about, groups, check-ins), people-search
//! result pages and event guest lists. Lists are paginated by scrolling until
//! they stop growing, pacing is adapted to observed page-load times, and a
//! pause/stop protocol lets a front-end interrupt a crawl between items.

pub mod config;
pub mod crawler;
pub mod driver;
pub mod output;
pub mod scraper;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Profile-Trawler operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser driver error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Login failed for {user}")]
    LoginFailed { user: String },

    #[error("Failed to read credentials: {0}")]
    Credentials(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing locator value: {0}")]
    MissingLocator(String),
}

/// Result type alias for Profile-Trawler operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Crawler;
pub use driver::{DriverError, ElementHandle, Locator, PageDriver};
pub use scraper::Scraper;
pub use state::{ControlState, Controller, DelayRegulator};
