use crate::output::{OutputError, OutputResult, RecordWriter};
use reqwest::Client;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const MAX_PARALLEL_DOWNLOADS: usize = 4;

/// Builds the HTTP client used for image downloads
pub fn build_image_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("profile-trawler/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// File name an image is stored under: the last segment of its URL path
pub fn image_file_name(url: &str, seq: usize) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("photo-{}.jpg", seq))
}

/// Outcome of an album once every download has settled
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlbumReport {
    pub saved: usize,
    pub broken: Vec<String>,
}

/// A folder of downloaded images
///
/// Downloads run in the background while the crawl continues; `finish`
/// waits for them. A failed download is reported, never fatal to the album.
pub struct Album {
    directory: PathBuf,
    client: Client,
    sidecar: Option<RecordWriter>,
    downloads: JoinSet<OutputResult<PathBuf>>,
    permits: Arc<Semaphore>,
    file_names: HashSet<String>,
    photos: usize,
}

impl Album {
    /// Creates the album folder and, with `descriptions`, the `<folder>.csv` sidecar
    pub fn create(directory: &Path, descriptions: bool, client: Client) -> OutputResult<Self> {
        fs::create_dir_all(directory).map_err(|source| OutputError::FolderCreation {
            path: directory.to_path_buf(),
            source,
        })?;

        let sidecar = if descriptions {
            Some(RecordWriter::create(
                directory,
                &["filename", "description", "permalink"],
            )?)
        } else {
            None
        };

        Ok(Self {
            directory: directory.to_path_buf(),
            client,
            sidecar,
            downloads: JoinSet::new(),
            permits: Arc::new(Semaphore::new(MAX_PARALLEL_DOWNLOADS)),
            file_names: HashSet::new(),
            photos: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Queues the download of `url` and records its description
    pub fn add_photo(&mut self, url: &str, description: &str, permalink: &str) -> OutputResult<()> {
        self.photos += 1;
        let mut file_name = image_file_name(url, self.photos);
        if self.file_names.contains(&file_name) {
            file_name = format!("{}-{}", self.photos, file_name);
        }
        self.file_names.insert(file_name.clone());

        if let Some(sidecar) = self.sidecar.as_mut() {
            sidecar.add([file_name.as_str(), description, permalink])?;
        }

        let client = self.client.clone();
        let permits = Arc::clone(&self.permits);
        let target = self.directory.join(&file_name);
        let url = url.to_string();
        self.downloads.spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|e| OutputError::BrokenImage {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            download_image(&client, &url, &target).await?;
            tracing::debug!("Saved image {}", target.display());
            Ok(target)
        });

        Ok(())
    }

    /// Waits for all queued downloads
    pub async fn finish(mut self) -> OutputResult<AlbumReport> {
        let mut report = AlbumReport::default();

        while let Some(joined) = self.downloads.join_next().await {
            match joined {
                Ok(Ok(_)) => report.saved += 1,
                Ok(Err(OutputError::BrokenImage { url, reason })) => {
                    tracing::error!("Failed to download image {}: {}", url, reason);
                    report.broken.push(url);
                }
                Ok(Err(e)) => return Err(e),
                Err(e) => tracing::error!("Image download task failed: {}", e),
            }
        }

        Ok(report)
    }
}

async fn download_image(client: &Client, url: &str, target: &Path) -> OutputResult<()> {
    let broken = |reason: String| OutputError::BrokenImage {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| broken(e.to_string()))?;
    let bytes = response.bytes().await.map_err(|e| broken(e.to_string()))?;
    if bytes.is_empty() {
        return Err(broken("empty response body".to_string()));
    }

    tokio::fs::write(target, &bytes).await?;
    Ok(())
}
