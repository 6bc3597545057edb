//! Typed progress events shared by the download manager and the
//! duplicate resolver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a single download.
///
/// Events for one download id always follow
/// `Started -> InProgress* -> (Completed | Failed)`. `Started` may be
/// emitted twice: once before the request is opened (total unknown) and
/// once with the declared content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    /// Slot acquired, transfer starting.
    Started,
    /// A chunk has been written to the temporary file.
    InProgress,
    /// File renamed onto its final path.
    Completed,
    /// Transfer aborted; no file at the final path was produced.
    Failed,
}

impl DownloadPhase {
    /// Whether no further events follow this phase.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of one download.
///
/// `total_bytes == 0` means the size is unknown, not that the file is
/// empty. On `Completed`, `current_bytes == total_bytes == bytes written`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// `<directory>/<filename>` of the request.
    pub download_id: String,
    /// Bytes written to disk so far.
    pub current_bytes: u64,
    /// Declared (or, once completed, actual) size.
    pub total_bytes: u64,
    /// Lifecycle phase.
    pub phase: DownloadPhase,
    /// Error detail, only set on `Failed`.
    pub error: Option<String>,
    /// Destination filename.
    pub filename: String,
    /// Source URL.
    pub url: String,
}

impl ProgressEvent {
    /// Completion percentage, 0-100.
    ///
    /// Unknown totals report 0 until the download completes.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total_bytes > 0 {
            (self.current_bytes.saturating_mul(100) / self.total_bytes).min(100) as u8
        } else if self.phase == DownloadPhase::Completed {
            100
        } else {
            0
        }
    }
}

/// Status of a duplicate-removal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStatus {
    /// Created, not started.
    #[default]
    Pending,
    /// Scanning, fingerprinting or deleting.
    Running,
    /// Finished normally.
    Completed,
    /// Aborted (missing directory or cancellation).
    Failed,
}

impl RemovalStatus {
    /// Whether this status ends the run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Counters of a duplicate-removal run over one directory.
///
/// Counters only grow during a run, and
/// `duplicates_removed <= duplicates_found <= files_scanned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DuplicateRemovalProgress {
    /// Directory being resolved.
    pub directory: PathBuf,
    /// Media files listed in the directory.
    pub files_scanned: usize,
    /// Candidate files whose fingerprint has been computed (or attempted).
    pub files_processed: usize,
    /// Files found to be redundant copies.
    pub duplicates_found: usize,
    /// Redundant copies actually removed.
    pub duplicates_removed: usize,
    /// Run status.
    pub status: RemovalStatus,
}

impl DuplicateRemovalProgress {
    /// Fresh, pending progress for `directory`.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            ..Default::default()
        }
    }

    /// Fingerprinting completion percentage, 0-100.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.files_scanned == 0 {
            return 0;
        }
        ((self.files_processed * 100) / self.files_scanned).min(100) as u8
    }
}

/// Anything the core reports to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// A download changed phase or advanced.
    Download(ProgressEvent),
    /// A duplicate-removal run advanced.
    Removal(DuplicateRemovalProgress),
}
