//! Profile-Trawler main entry point
//!
//! This is the command-line interface for the Profile-Trawler crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use profile_trawler::config::{load_config_with_hash, Config};
use profile_trawler::crawler::GuestCategory;
use profile_trawler::driver::ChromiumDriver;
use profile_trawler::output::build_image_client;
use profile_trawler::scraper::ScrapeReport;
use profile_trawler::{Scraper, TrawlError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Profile-Trawler: a paced, interruptible profile crawler
///
/// Profile-Trawler logs into the site with a real browser and crawls target
/// profiles section by section, writing one CSV file per section and one
/// folder per photo album. Ctrl-C stops the crawl after the current item.
#[derive(Parser, Debug)]
#[command(name = "profile-trawler")]
#[command(version = "1.0.0")]
#[command(about = "A paced, interruptible profile crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// File holding the login email on its first line and the password on its second
    #[arg(long, value_name = "FILE", default_value = "login.txt")]
    login: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape target profiles given as IDs, user names or URLs
    Scrape {
        /// Targets; read from --input or stdin when omitted
        targets: Vec<String>,

        /// File with one target per line
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Scrape the people of a search result page
    Search {
        url: String,

        /// Maximum number of results, 0 for all
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Scrape the guest lists of an event
    Event {
        url: String,

        /// Guest categories to crawl
        #[arg(long, value_delimiter = ',', default_value = "going,interested,invited")]
        guests: Vec<GuestCategory>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.check_config {
        handle_check_config(&config);
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given; use `scrape`, `search` or `event`");
    };

    let (user, password) = read_credentials(&cli.login)?;

    let driver = ChromiumDriver::launch(&config.browser).await?;
    let client = build_image_client(config.crawler.operation_timeout())?;
    let scraper = Scraper::new(driver, &config, client);

    // Ctrl-C stops the running crawl cooperatively
    let control = Arc::clone(scraper.crawler().control());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            control.interrupt(None, false).await;
        }
    });

    let outcome = run(&scraper, &user, &password, command).await;

    interrupt.abort();
    if let Err(e) = scraper.into_driver().close().await {
        tracing::warn!("Failed to close the browser: {}", e);
    }

    if let Err(e) = &outcome {
        tracing::error!("Crawl failed: {:#}", e);
    }
    outcome
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("profile_trawler=info,warn"),
            1 => EnvFilter::new("profile_trawler=debug,info"),
            2 => EnvFilter::new("profile_trawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --check-config: prints what a scrape would do
fn handle_check_config(config: &Config) {
    println!("=== Profile-Trawler Configuration ===\n");

    println!("Crawler:");
    println!("  Minimum delay: {}s", config.crawler.min_delay);
    println!("  Dynamic delay: {}", config.crawler.dynamic_delay);
    println!("  Operation timeout: {}s", config.crawler.operation_timeout);
    println!("  Login page: {}", config.crawler.login_url);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Folders: {}", config.output.folder_naming);
    println!("  Files: {}", config.output.file_naming);

    let sections = &config.sections;
    let enabled: Vec<&str> = [
        ("posts", sections.posts),
        ("friends", sections.friends),
        ("photos", sections.photos),
        ("likes", sections.likes),
        ("about", sections.about),
        ("groups", sections.groups),
        ("checkins", sections.checkins),
    ]
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();
    println!("\nSections: {}", enabled.join(", "));
    println!("Browser: {}", if config.browser.headless { "headless" } else { "headed" });

    println!("\n✓ Configuration is valid");
}

/// Reads the two-line login file
fn read_credentials(path: &Path) -> Result<(String, String), TrawlError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TrawlError::Credentials(format!("{}: {}", path.display(), e)))?;
    let mut lines = content.lines().map(str::trim).filter(|line| !line.is_empty());
    match (lines.next(), lines.next()) {
        (Some(user), Some(password)) => Ok((user.to_string(), password.to_string())),
        _ => Err(TrawlError::Credentials(format!(
            "{} must hold the email and the password on two lines",
            path.display()
        ))),
    }
}

async fn run(
    scraper: &Scraper<ChromiumDriver>,
    user: &str,
    password: &str,
    command: Command,
) -> anyhow::Result<()> {
    if scraper.login(user, password).await? != Some(true) {
        return Err(TrawlError::LoginFailed {
            user: user.to_string(),
        }
        .into());
    }

    match command {
        Command::Scrape { targets, input } => {
            let targets = read_targets(targets, input.as_deref()).await?;
            tracing::info!("Scraping {} targets", targets.len());
            for target in &targets {
                match scraper.scrape(target).await? {
                    Some(report) => print_report(&report),
                    None => {
                        tracing::warn!("Scrape of {} was not started", target);
                        break;
                    }
                }
                if scraper.crawler().control().is_stop_requested() {
                    break;
                }
            }
        }
        Command::Search { url, limit } => {
            if let Some(count) = scraper.search(&url, limit).await? {
                println!("✓ Scraped {} search results", count);
            }
        }
        Command::Event { url, guests } => {
            if let Some(count) = scraper.event(&url, &guests).await? {
                println!("✓ Scraped {} guests", count);
            }
        }
    }

    Ok(())
}

/// Targets from the command line, else from `input`, else from stdin
async fn read_targets(targets: Vec<String>, input: Option<&Path>) -> anyhow::Result<Vec<String>> {
    if !targets.is_empty() {
        return Ok(targets);
    }

    let lines: Vec<String> = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut read = Vec::new();
            while let Some(line) = lines.next_line().await? {
                read.push(line);
            }
            read
        }
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}

fn print_report(report: &ScrapeReport) {
    if !report.valid {
        println!("✗ {} is not available, skipped", report.target_url);
        return;
    }

    println!("=== {} ===", report.target);
    for (section, count) in &report.counts {
        println!("  {:<10} {}", section.to_string(), count);
    }
    if !report.broken_images.is_empty() {
        println!("  {} images failed to download", report.broken_images.len());
    }
    if report.stopped {
        println!("  (stopped before completion)");
    }
}
