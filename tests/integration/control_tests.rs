//! Pause, stop and exclusivity of scrapes driven from a second task

use crate::common::{config, profile, TARGET_URL};
use profile_trawler::scraper::Section;
use profile_trawler::{ControlState, Scraper};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// Photos stay off so nothing touches the network
fn scraper(output: &TempDir, friends: usize) -> Scraper<profile_trawler::driver::ScriptedDriver> {
    let mut config = config(output.path());
    config.sections.photos = false;
    let driver = profile(&config, "http://127.0.0.1:9", friends);
    Scraper::new(driver, &config, reqwest::Client::new())
}

#[tokio::test(start_paused = true)]
async fn test_second_operation_is_refused() {
    let output = TempDir::new().unwrap();
    let scraper = scraper(&output, 3);
    let crawler = scraper.crawler();

    let (report, refused) = tokio::join!(scraper.scrape("jane.doe"), async {
        crawler.control().wait_for_status(ControlState::Running).await;
        let before = crawler.session().driver().navigations().len();
        let mut calls = 0;
        let result = crawler.crawl_likes(TARGET_URL, |_, _| calls += 1).await.unwrap();
        let after = crawler.session().driver().navigations().len();
        (result, calls, after - before)
    });

    assert_eq!(refused, (None, 0, 0));
    assert!(report.unwrap().unwrap().valid);
    assert_eq!(crawler.status(), ControlState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_stops_scrape_and_restarts() {
    let output = TempDir::new().unwrap();
    let scraper = scraper(&output, 50);
    let crawler = scraper.crawler();
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    let (report, ()) = tokio::join!(scraper.scrape("jane.doe"), async {
        crawler.control().wait_for_status(ControlState::Running).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        crawler
            .interrupt(Some(Box::new(move || flag.store(true, Ordering::SeqCst))), true)
            .await;
    });

    let report = report.unwrap().unwrap();
    assert!(report.stopped);
    assert!(report.count(Section::Friends) < 50);
    assert!(!report.counts.contains_key(&Section::Groups));
    assert!(called.load(Ordering::SeqCst));
    assert_eq!(crawler.status(), ControlState::Ready);

    // The restarted session takes new work
    assert!(crawler.crawl_groups(TARGET_URL, |_, _| {}).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_when_idle_blocks_new_work() {
    let output = TempDir::new().unwrap();
    let scraper = scraper(&output, 3);
    let crawler = scraper.crawler();

    crawler.interrupt(None, false).await;
    assert_eq!(crawler.status(), ControlState::Stopped);
    assert!(scraper.scrape("jane.doe").await.unwrap().is_none());
    assert!(crawler.session().driver().navigations().is_empty());

    crawler.restart();
    assert!(scraper.scrape("jane.doe").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_the_crawl() {
    let output = TempDir::new().unwrap();
    let scraper = scraper(&output, 30);
    let crawler = scraper.crawler();

    let (report, held) = tokio::join!(scraper.scrape("jane.doe"), async {
        crawler.control().wait_for_status(ControlState::Running).await;
        crawler.pause();
        crawler.control().wait_for_status(ControlState::Paused).await;

        let before = crawler.session().driver().navigations().len();
        tokio::time::sleep(Duration::from_secs(600)).await;
        let after = crawler.session().driver().navigations().len();
        let status = crawler.status();

        crawler.unpause();
        (after - before, status)
    });

    assert_eq!(held, (0, ControlState::Paused));
    let report = report.unwrap().unwrap();
    assert!(!report.stopped);
    assert_eq!(report.count(Section::Friends), 30);
}
