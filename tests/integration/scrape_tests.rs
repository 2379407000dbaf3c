//! End-to-end scrapes of a scripted profile
//!
//! Album images are served by a wiremock server, so these tests run on the
//! real clock with short delays.

use crate::common::{csv_rows, fast_config, find_output, profile, TARGET_URL};
use profile_trawler::driver::scripted::{ScriptedDriver, ScriptedElement};
use profile_trawler::scraper::Section;
use profile_trawler::{Locator, Scraper};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"lake".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"boat".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/broken.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_full_scrape() {
    let server = image_server().await;
    let output = TempDir::new().unwrap();
    let config = fast_config(output.path());
    let driver = profile(&config, &server.uri(), 3);
    let scraper = Scraper::new(driver, &config, reqwest::Client::new());

    let report = scraper.scrape("jane.doe").await.unwrap().unwrap();

    assert!(report.valid);
    assert!(!report.stopped);
    assert_eq!(report.target, "jane.doe");
    assert_eq!(report.target_url, TARGET_URL);
    assert_eq!(report.count(Section::Posts), 2);
    assert_eq!(report.count(Section::Friends), 3);
    assert_eq!(report.count(Section::Photos), 2);
    assert_eq!(report.count(Section::Albums), 1);
    assert_eq!(report.count(Section::Likes), 1);
    assert_eq!(report.count(Section::About), 1);
    assert_eq!(report.count(Section::Groups), 1);
    assert_eq!(report.count(Section::Checkins), 0);
    assert_eq!(report.broken_images, vec![format!("{}/img/broken.jpg", server.uri())]);

    let posts = csv_rows(&find_output(output.path(), "jane.doe", "-posts.csv").unwrap());
    assert_eq!(posts[0], vec!["date", "post", "translation", "permalink"]);
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[1][1], "Off to the lake!");
    assert_eq!(posts[1][0].len(), "20170714-024000".len());
    assert_eq!(posts[1][3], "https://www.facebook.com/jane.doe/posts/1");
    assert_eq!(posts[2][0], "");

    let friends = csv_rows(&find_output(output.path(), "jane.doe", "-friends.csv").unwrap());
    assert_eq!(friends.len(), 4);
    assert_eq!(friends[3][0], "Friend 3");
    assert_eq!(friends[3][1], "https://www.facebook.com/friend3");

    let photos = find_output(output.path(), "jane.doe", "-photos").unwrap();
    assert_eq!(std::fs::read(photos.join("a.jpg")).unwrap(), b"lake");
    assert!(!photos.join("broken.jpg").exists());
    let sidecar = csv_rows(&find_output(output.path(), "jane.doe", "-photos.csv").unwrap());
    assert_eq!(sidecar[0], vec!["filename", "description", "permalink"]);
    assert_eq!(sidecar.len(), 3);
    assert_eq!(sidecar[1][1], "May be an image of a lake");

    let album = find_output(output.path(), "jane.doe", "-album-Summer-2017").unwrap();
    assert_eq!(std::fs::read(album.join("b.jpg")).unwrap(), b"boat");

    let about = csv_rows(&find_output(output.path(), "jane.doe", "-about.csv").unwrap());
    assert_eq!(about[1], vec!["Overview", "Lives in Lisbon"]);

    let likes = csv_rows(&find_output(output.path(), "jane.doe", "-likes.csv").unwrap());
    assert_eq!(likes[1], vec!["Rust", "https://www.facebook.com/rustlang"]);

    let checkins = csv_rows(&find_output(output.path(), "jane.doe", "-checkins.csv").unwrap());
    assert_eq!(checkins, vec![vec!["name", "url"]]);
}

#[tokio::test]
async fn test_disabled_sections_are_skipped() {
    let server = image_server().await;
    let output = TempDir::new().unwrap();
    let mut config = fast_config(output.path());
    config.sections.photos = false;
    config.sections.posts = false;
    let driver = profile(&config, &server.uri(), 3);
    let scraper = Scraper::new(driver, &config, reqwest::Client::new());

    let report = scraper.scrape(TARGET_URL).await.unwrap().unwrap();

    assert!(!report.counts.contains_key(&Section::Posts));
    assert!(!report.counts.contains_key(&Section::Albums));
    assert_eq!(report.count(Section::Friends), 3);
    assert!(find_output(output.path(), "jane.doe", "-photos").is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_target_writes_nothing() {
    let output = TempDir::new().unwrap();
    let config = crate::common::config(output.path());
    let banner = ScriptedElement::new("").with_children(
        Locator::css(&config.locators.css.error_header),
        vec![ScriptedElement::new("Sorry, this content isn't available right now")],
    );
    let driver = ScriptedDriver::new().with_page("https://www.facebook.com/profile.php?id=4", banner);
    let scraper = Scraper::new(driver, &config, reqwest::Client::new());

    let report = scraper.scrape("4").await.unwrap().unwrap();

    assert!(!report.valid);
    assert_eq!(report.target, "4");
    assert!(report.counts.is_empty());
    assert_eq!(scraper.crawler().session().driver().navigations().len(), 1);
    assert!(!output.path().join("4").exists());
}

#[tokio::test(start_paused = true)]
async fn test_event_guests_file() {
    let output = TempDir::new().unwrap();
    let config = crate::common::config(output.path());
    let css = &config.locators.css;
    let url = "https://www.facebook.com/events/42/";

    let guest = ScriptedElement::new("Ana").with_children(
        Locator::xpath(&config.locators.xpath.guest_info),
        vec![ScriptedElement::new("Ana").with_attribute("href", "https://www.facebook.com/ana")],
    );
    let scroller = ScriptedElement::new("").with_children(Locator::css(&css.guest_list), vec![guest]);
    let page = ScriptedElement::new("")
        .with_children(
            Locator::css(&css.guest_categories),
            vec![ScriptedElement::new("1 Interested")],
        )
        .with_children(Locator::css(&css.guest_scroller), vec![scroller]);
    let scraper = Scraper::new(
        ScriptedDriver::new().with_page(url, page),
        &config,
        reqwest::Client::new(),
    );

    let count = scraper
        .event(url, &[profile_trawler::crawler::GuestCategory::Interested])
        .await
        .unwrap();

    assert_eq!(count, Some(1));
    let rows = csv_rows(&find_output(output.path(), "42", "-guests.csv").unwrap());
    assert_eq!(rows[1], vec!["interested", "Ana", "https://www.facebook.com/ana", ""]);
}
