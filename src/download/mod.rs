//! Concurrent media downloads.
//!
//! - [`request`]: what to fetch and how it ended
//! - [`source`]: the fetch seam ([`MediaSource`]) and its reqwest implementation
//! - [`manager`]: [`DownloadManager`], the bounded, idempotent downloader
//! - [`resolver`]: [`MediaResolver`], embed page to direct URL
//!
//! # Example
//!
//! ```no_run
//! use mediavault::download::{DownloadConfig, DownloadManager, DownloadRequest, HttpSource};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let source = Arc::new(HttpSource::new("mediavault", Duration::from_secs(60))?);
//! let manager = DownloadManager::new(DownloadConfig::default(), source)?;
//! let request = DownloadRequest::new("https://i.example/a.jpg", "downloads/alice", "a.jpg");
//! if let Some(outcome) = manager.submit(request).await {
//!     println!("{} -> {:?}", outcome.download_id, outcome.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod request;
pub mod resolver;
pub mod source;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use manager::{DownloadConfig, DownloadManager, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT};
pub use request::{is_temp_file, DownloadOutcome, DownloadRequest, SeenUrlSet, TerminalState};
pub use resolver::MediaResolver;
pub use source::{FetchError, HttpSource, MediaBody, MediaSource, DEFAULT_USER_AGENT};

/// Errors from the download manager.
///
/// Only [`DownloadError::Config`] is returned to callers directly; the
/// rest end up as the error text of a failed outcome.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Invalid manager limits.
    #[error("Invalid download configuration: {0}")]
    Config(String),

    /// Opening or reading the remote resource failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Writing, syncing or renaming the local file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The slot semaphore was closed.
    #[error("download slots closed")]
    SlotsClosed,
}

impl DownloadError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
