//! Download requests, outcomes and the seen-URL set.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Suffix of the temporary file written beside the destination.
pub const TEMP_SUFFIX: &str = ".part";

/// One file to fetch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    /// Must already exist; the manager never creates directories.
    pub directory: PathBuf,
    pub filename: String,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(url: impl Into<String>, directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    /// `<directory>/<filename>`, used to correlate progress events.
    #[must_use]
    pub fn download_id(&self) -> String {
        format!("{}/{}", self.directory.display(), self.filename)
    }

    /// Final path of the downloaded file.
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Temporary path in the same directory, so the final rename stays on
    /// one filesystem.
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        self.directory.join(format!("{}{}", self.filename, TEMP_SUFFIX))
    }
}

/// How a download ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalState {
    Completed,
    Failed,
}

/// Result of one download. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub download_id: String,
    pub bytes_transferred: u64,
    /// Declared length, or the actual length once completed. 0 = unknown.
    pub bytes_total: u64,
    pub state: TerminalState,
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub(crate) fn completed(download_id: String, bytes: u64) -> Self {
        Self {
            download_id,
            bytes_transferred: bytes,
            bytes_total: bytes,
            state: TerminalState::Completed,
            error: None,
        }
    }

    pub(crate) fn failed(download_id: String, transferred: u64, total: u64, error: String) -> Self {
        Self {
            download_id,
            bytes_transferred: transferred,
            bytes_total: total,
            state: TerminalState::Failed,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }
}

/// URLs already materialised on disk during one run. Only grows.
#[derive(Debug, Clone, Default)]
pub struct SeenUrlSet {
    urls: HashSet<String>,
}

impl SeenUrlSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Record `url`; returns false if it was already present.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        self.urls.insert(url.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SeenUrlSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            urls: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Whether `path` looks like a leftover temporary file.
#[must_use]
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}
