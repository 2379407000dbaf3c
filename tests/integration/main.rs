//! Integration tests for profile scrapes
//!
//! The browser is replaced by the scripted page driver; album images are
//! served by wiremock.

mod common;
mod control_tests;
mod scrape_tests;
