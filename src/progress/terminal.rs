//! Terminal progress bars using indicatif.
//!
//! One bar per in-flight download plus one bar for the duplicate-removal
//! pass. Finished downloads are cleared from the screen so the bar list
//! stays bounded by the download concurrency.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::{DownloadPhase, DuplicateRemovalProgress, ProgressEvent, ProgressSink};

/// indicatif-backed [`ProgressSink`].
pub struct TerminalProgress {
    multi: MultiProgress,
    downloads: Mutex<HashMap<String, ProgressBar>>,
    removal: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl TerminalProgress {
    /// Create a terminal reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use mediavault::progress::TerminalProgress;
    ///
    /// let progress = TerminalProgress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            downloads: Mutex::new(HashMap::new()),
            removal: Mutex::new(None),
            quiet,
        }
    }

    fn bytes_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn removal_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:30.green/blue}] {pos}/{len} fingerprinted {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn download_bar(&self, event: &ProgressEvent) -> ProgressBar {
        let mut bars = self.downloads.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(event.download_id.clone())
            .or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.set_message(event.filename.clone());
                pb
            })
            .clone()
    }

    fn forget_download(&self, download_id: &str) {
        self.downloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(download_id);
    }
}

impl ProgressSink for TerminalProgress {
    fn on_download(&self, event: &ProgressEvent) {
        if self.quiet {
            return;
        }

        let pb = self.download_bar(event);
        match event.phase {
            DownloadPhase::Started => {
                if event.total_bytes > 0 {
                    pb.set_style(Self::bytes_style());
                    pb.set_length(event.total_bytes);
                }
            }
            DownloadPhase::InProgress => {
                pb.set_position(event.current_bytes);
            }
            DownloadPhase::Completed => {
                pb.finish_and_clear();
                self.forget_download(&event.download_id);
                let _ = self.multi.println(format!("✓ {}", event.filename));
            }
            DownloadPhase::Failed => {
                pb.finish_and_clear();
                self.forget_download(&event.download_id);
                let _ = self.multi.println(format!(
                    "✗ {}: {}",
                    event.filename,
                    event.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }
    }

    fn on_removal(&self, progress: &DuplicateRemovalProgress) {
        if self.quiet {
            return;
        }

        let mut slot = self.removal.lock().unwrap_or_else(|e| e.into_inner());
        let pb = slot.get_or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(0));
            pb.set_style(Self::removal_style());
            pb
        });

        pb.set_length(progress.files_scanned as u64);
        pb.set_position(progress.files_processed as u64);
        pb.set_message(format!(
            "{} duplicate(s) found, {} removed",
            progress.duplicates_found, progress.duplicates_removed
        ));

        if progress.status.is_terminal() {
            pb.finish();
            *slot = None;
        }
    }
}
