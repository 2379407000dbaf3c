//! Configuration module for Profile-Trawler
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! including the locator table that describes the target site's markup.
//!
//! # Example
//!
//! ```no_run
//! use profile_trawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawler.toml")).unwrap();
//! println!("Minimum delay: {}s", config.crawler.min_delay);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AttributeNames, BrowserConfig, Config, CrawlerConfig, CssSelectors, LocatorTable,
    OutputConfig, PageReferences, SectionsConfig, TextContent, XPathSelectors,
    DEFAULT_FILE_NAMING, DEFAULT_FOLDER_NAMING,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
