//! Scripted profile shared by the integration tests

use profile_trawler::config::{parse_config, Config};
use profile_trawler::driver::scripted::{ScriptedDriver, ScriptedElement};
use profile_trawler::url::join_query;
use profile_trawler::Locator;
use std::path::{Path, PathBuf};

pub const TARGET_URL: &str = "https://www.facebook.com/jane.doe";
pub const ALBUM_URL: &str = "https://www.facebook.com/media/set/?set=a.1";

/// The example configuration writing into `output`
pub fn config(output: &Path) -> Config {
    let mut config = parse_config(include_str!("../../trawler.example.toml")).unwrap();
    config.output.directory = output.display().to_string();
    config
}

/// Like [`config`], with delays short enough for a real clock
pub fn fast_config(output: &Path) -> Config {
    let mut config = config(output);
    config.crawler.min_delay = 0.01;
    config.crawler.dynamic_delay = false;
    config.crawler.retry_wait = 0.01;
    config
}

fn link(text: &str, href: &str) -> ScriptedElement {
    ScriptedElement::new(text).with_attribute("href", href)
}

/// A profile whose photos are served from `image_base`
///
/// - 2 posts, 3 friends (loaded 2 then 3), `friend_count` friends when larger
/// - 2 photos (`a.jpg`, `broken.jpg`) and one album holding `b.jpg`
/// - 1 like, 1 about section, 1 group and no check-ins
pub fn profile(config: &Config, image_base: &str, friend_count: usize) -> ScriptedDriver {
    let locators = &config.locators;
    let css = &locators.css;
    let page = |query: &str| join_query(TARGET_URL, query);

    let date = ScriptedElement::new("14 July 2017")
        .with_attribute(&locators.attributes.post_timestamp, "1500000000")
        .with_children(
            Locator::xpath(&locators.xpath.date_link),
            vec![link("", "https://www.facebook.com/jane.doe/posts/1")],
        );
    let posts = vec![
        ScriptedElement::new("Off to the lake!")
            .with_children(Locator::xpath(&locators.xpath.post_date), vec![date]),
        ScriptedElement::new("Back home."),
    ];
    let timeline = ScriptedElement::new("").with_children(Locator::css(&css.user_posts), posts);

    let friend_count = friend_count.max(3);
    let friends: Vec<_> = (1..=friend_count)
        .map(|i| {
            ScriptedElement::new(format!("Friend {}", i)).with_children(
                Locator::xpath(&locators.xpath.friend_info),
                vec![link(
                    &format!("Friend {}", i),
                    &format!("https://www.facebook.com/friend{}?fref=pb&hc_location=friends_tab", i),
                )],
            )
        })
        .collect();
    let growth = if friend_count == 3 {
        vec![0, 2, 3]
    } else {
        (0..=friend_count.div_ceil(10)).map(|k| (k * 10).min(friend_count)).collect()
    };
    let friends_page = ScriptedElement::new("")
        .with_children(Locator::css(&css.friends), friends)
        .with_growth(Locator::css(&css.friends), growth);

    let photo = |name: &str| {
        ScriptedElement::new("")
            .with_attribute(&locators.attributes.photo_source, format!("{}/img/{}", image_base, name))
            .with_children(
                Locator::css(&css.photo_link),
                vec![link("", &format!("https://www.facebook.com/photo.php?fbid={}", name))
                    .with_attribute("aria-label", "May be an image of a lake")],
            )
    };
    let photos_page = ScriptedElement::new("")
        .with_children(Locator::css(&css.photos), vec![photo("a.jpg"), photo("broken.jpg")]);

    let albums_page = ScriptedElement::new("")
        .with_children(Locator::css(&css.albums), vec![link("Summer 2017", ALBUM_URL)]);
    let tile = link("", "https://www.facebook.com/photo.php?fbid=b")
        .with_attribute("aria-label", "May be an image of a boat")
        .with_children(
            Locator::css(&css.album_photo_image),
            vec![ScriptedElement::new("").with_attribute("src", format!("{}/img/b.jpg", image_base))],
        );
    let album_page = ScriptedElement::new("").with_children(Locator::css(&css.album_photos), vec![tile]);

    let likes_page = ScriptedElement::new("").with_children(
        Locator::xpath(&locators.xpath.likes),
        vec![link("Rust", "https://www.facebook.com/rustlang")],
    );

    let pane = ScriptedElement::new("");
    let about_link = ScriptedElement::new("Overview")
        .with_attribute(&locators.attributes.about_title, "Overview")
        .on_click(profile_trawler::driver::scripted::ClickAction::SetText {
            target: pane.clone(),
            text: "Lives in Lisbon".to_string(),
        });
    let about_page = ScriptedElement::new("")
        .with_children(Locator::css(&css.about_links), vec![about_link])
        .with_children(Locator::css(&css.about_main), vec![pane]);

    let groups_page = ScriptedElement::new("").with_children(
        Locator::css(&css.groups),
        vec![link("Rustaceans", "https://www.facebook.com/groups/rust")],
    );

    ScriptedDriver::new()
        .with_page(TARGET_URL, timeline)
        .with_page(&page(&locators.pages.friends), friends_page)
        .with_page(&page(&locators.pages.photos), photos_page)
        .with_page(&page(&locators.pages.albums), albums_page)
        .with_page(ALBUM_URL, album_page)
        .with_page(&page(&locators.pages.likes), likes_page)
        .with_page(&page(&locators.pages.about), about_page)
        .with_page(&page(&locators.pages.groups), groups_page)
}

/// The output file or folder of `target` whose name ends with `suffix`
pub fn find_output(output: &Path, target: &str, suffix: &str) -> Option<PathBuf> {
    std::fs::read_dir(output.join(target))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(suffix))
        })
}

/// Rows of a CSV file, header included
pub fn csv_rows(path: &Path) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap()
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}
