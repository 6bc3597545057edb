//! End-of-run tally for an archive run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use serde::Serialize;

use super::plan::SkippedMedia;
use super::ArchiveError;

/// A download that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDownload {
    pub url: String,
    pub download_id: String,
    pub error: String,
}

/// What one archive run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    pub directory: PathBuf,
    pub items: usize,
    /// Requests handed to the download manager.
    pub requested: usize,
    pub completed: usize,
    pub failed: usize,
    /// Requests dropped because the URL was already fetched this run.
    pub skipped: usize,
    /// Media left out at planning time.
    pub unsupported: Vec<SkippedMedia>,
    pub bytes_downloaded: u64,
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
    pub bytes_freed: u64,
    pub failures: Vec<FailedDownload>,
    pub cancelled: bool,
}

impl ArchiveReport {
    #[must_use]
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Write the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::WriteSummary`] if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<(), ArchiveError> {
        let write_err = |source: std::io::Error| ArchiveError::WriteSummary {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        fs::write(path, json).map_err(write_err)
    }
}

impl fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Archive: {}", self.directory.display())?;
        writeln!(
            f,
            "  Downloads:  {} completed, {} failed, {} skipped ({})",
            self.completed,
            self.failed,
            self.skipped,
            ByteSize::b(self.bytes_downloaded)
        )?;
        if !self.unsupported.is_empty() {
            writeln!(f, "  Unsupported media: {}", self.unsupported.len())?;
        }
        write!(
            f,
            "  Duplicates: {} found, {} removed ({} freed)",
            self.duplicates_found,
            self.duplicates_removed,
            ByteSize::b(self.bytes_freed)
        )?;
        if self.cancelled {
            write!(f, "\n  Run was interrupted")?;
        }
        Ok(())
    }
}
