//! Archiving content items.
//!
//! An archive run reads a list of [`ContentItem`]s, plans one download per
//! media URL, fetches them through the shared
//! [`DownloadManager`](crate::download::DownloadManager) and finally
//! collapses duplicates in the destination directory.

pub mod archiver;
pub mod item;
pub mod plan;
pub mod summary;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;
use crate::duplicates::ResolverError;

pub use archiver::Archiver;
pub use item::{load_items, ContentItem, GalleryMedia};
pub use plan::{extract_extension, plan_requests, Plan, Planner, SkippedMedia};
pub use summary::{ArchiveReport, FailedDownload};

/// Errors that abort an archive run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read items from {path}: {source}")]
    ReadItems {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid items file {path}: {source}")]
    ParseItems {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Duplicate removal failed: {0}")]
    Dedupe(#[from] ResolverError),

    #[error("Cannot write summary {path}: {source}")]
    WriteSummary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
