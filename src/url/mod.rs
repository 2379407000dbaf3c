//! URL handling module for Profile-Trawler
//!
//! This module resolves crawl targets to profile URLs, builds section URLs
//! from query fragments and formats the timestamps used in output names.

mod target;

// Re-export main functions
pub use target::{
    format_unix_time, join_query, path_safe, strip_query, target_name, target_url,
    timestamp_now, TIMESTAMP_FORMAT,
};
