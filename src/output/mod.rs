//! Output module for persisting crawl results
//!
//! This module handles:
//! - Resolving output paths from the configured naming patterns
//! - Writing one CSV record file per entity type per target
//! - Downloading album images with an optional description sidecar

mod album;
mod naming;
mod record;

pub use album::{build_image_client, image_file_name, Album, AlbumReport};
pub use naming::{apply_pattern, OutputNaming};
pub use record::RecordWriter;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to create folder {}: {source}", path.display())]
    FolderCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to download image {url}: {reason}")]
    BrokenImage { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
