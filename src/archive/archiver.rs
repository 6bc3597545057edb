//! One archive run: plan, download, deduplicate.

use std::path::Path;
use std::sync::Arc;

use super::item::ContentItem;
use super::plan::plan_requests;
use super::summary::{ArchiveReport, FailedDownload};
use super::ArchiveError;
use crate::config::Config;
use crate::download::{DownloadManager, MediaResolver, MediaSource};
use crate::duplicates::DuplicateResolver;
use crate::progress::ProgressSink;
use crate::signal::CancelToken;

/// Downloads the media of content items into a directory and removes
/// duplicates afterwards.
///
/// The seen-URL set lives in the download manager, so repeated runs on one
/// `Archiver` never fetch a URL twice.
pub struct Archiver {
    allowed_extensions: Vec<String>,
    manager: Arc<DownloadManager>,
    resolver: MediaResolver,
    dedupe: DuplicateResolver,
    cancel: Option<CancelToken>,
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("allowed_extensions", &self.allowed_extensions)
            .field("manager", &self.manager)
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

impl Archiver {
    /// Build the download and dedupe engines from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Download`] or [`ArchiveError::Dedupe`] when
    /// an engine rejects its configuration.
    pub fn new(
        config: &Config,
        source: Arc<dyn MediaSource>,
        sink: Arc<dyn ProgressSink>,
        cancel: Option<CancelToken>,
    ) -> Result<Self, ArchiveError> {
        let mut manager = DownloadManager::new(config.download_config(), Arc::clone(&source))?
            .with_sink(Arc::clone(&sink));
        let mut dedupe = DuplicateResolver::new(config.resolver_config())?.with_sink(sink);
        if let Some(token) = &cancel {
            manager = manager.with_cancel_token(token.clone());
            dedupe = dedupe.with_cancel_token(token.clone());
        }

        Ok(Self {
            allowed_extensions: config.allowed_extensions.clone(),
            manager: Arc::new(manager),
            resolver: MediaResolver::new(source),
            dedupe,
            cancel,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Archive `items` into `directory`.
    ///
    /// Individual download failures are recorded in the report; only
    /// directory creation and engine-level dedupe failures abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::CreateDir`] or [`ArchiveError::Dedupe`].
    pub async fn archive(
        &self,
        items: &[ContentItem],
        directory: &Path,
    ) -> Result<ArchiveReport, ArchiveError> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| ArchiveError::CreateDir {
                path: directory.to_path_buf(),
                source,
            })?;

        let plan = plan_requests(items, directory, &self.allowed_extensions, &self.resolver).await;
        let mut report = ArchiveReport::new(directory);
        report.items = items.len();
        report.requested = plan.requests.len();
        report.unsupported = plan.skipped;

        log::info!(
            "Archiving {} item(s) into {}: {} download(s) planned",
            items.len(),
            directory.display(),
            report.requested
        );

        let handles: Vec<_> = plan
            .requests
            .into_iter()
            .map(|request| {
                let manager = Arc::clone(&self.manager);
                let url = request.url.clone();
                let handle = tokio::spawn(async move { manager.submit(request).await });
                (url, handle)
            })
            .collect();

        for (url, handle) in handles {
            match handle.await {
                Ok(Some(outcome)) if outcome.is_completed() => {
                    report.completed += 1;
                    report.bytes_downloaded += outcome.bytes_transferred;
                }
                Ok(Some(outcome)) => {
                    report.failed += 1;
                    report.failures.push(FailedDownload {
                        url,
                        download_id: outcome.download_id,
                        error: outcome.error.unwrap_or_default(),
                    });
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    log::warn!("Download task for {} died: {}", url, e);
                    report.failed += 1;
                    report.failures.push(FailedDownload {
                        url,
                        download_id: String::new(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if self.is_cancelled() {
            log::info!("Cancelled, skipping duplicate removal in {}", directory.display());
            report.cancelled = true;
            return Ok(report);
        }

        let dedupe = self
            .dedupe
            .resolve_with_report(directory, &self.allowed_extensions)
            .await?;
        report.duplicates_found = dedupe.duplicates_found;
        report.duplicates_removed = dedupe.duplicates_removed;
        report.bytes_freed = dedupe.bytes_freed;
        report.cancelled = dedupe.cancelled;

        log::info!(
            "Archive of {} finished: {} downloaded, {} failed, {} duplicate(s) removed",
            directory.display(),
            report.completed,
            report.failed,
            report.duplicates_removed
        );
        Ok(report)
    }
}
