//! Bounded-concurrency download manager.
//!
//! One manager serves one archiving run. It owns the run's
//! [`SeenUrlSet`] and every temporary file it creates.
//!
//! # Guarantees
//!
//! - At most `max_concurrent` transfers hold a slot at once; extra
//!   submissions wait on a tokio [`Semaphore`].
//! - A URL already on disk, or already being fetched, is skipped without
//!   I/O and without progress events.
//! - Bytes go to `<filename>.part` beside the destination and are renamed
//!   into place only after a full, synced write. The destination never
//!   holds a partial file.
//! - A failed download removes its temporary file, emits one `failed`
//!   event, and leaves the URL eligible for a later retry.
//! - Dropping a `submit` future part way (a timeout, an aborted task)
//!   releases its URL and removes its temporary file.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

use super::request::{DownloadOutcome, DownloadRequest, SeenUrlSet};
use super::source::MediaSource;
use super::DownloadError;
use crate::progress::{DownloadPhase, NullSink, ProgressEvent, ProgressSink};
use crate::signal::{wait_cancelled, CancelToken};

/// Default write chunk size (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Default number of simultaneous transfers.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Manager limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Largest slice written (and reported) at once.
    pub chunk_size: usize,
    pub max_concurrent: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    seen: SeenUrlSet,
    in_flight: HashSet<String>,
}

/// Fetches URLs to disk under a global concurrency cap.
pub struct DownloadManager {
    config: DownloadConfig,
    source: Arc<dyn MediaSource>,
    slots: Semaphore,
    ledger: Mutex<Ledger>,
    sink: Arc<dyn ProgressSink>,
    cancel: Option<CancelToken>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("config", &self.config)
            .field("available_slots", &self.slots.available_permits())
            .field("seen", &self.seen_count())
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Create a manager with an empty seen set.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Config`] if either limit is zero.
    pub fn new(config: DownloadConfig, source: Arc<dyn MediaSource>) -> Result<Self, DownloadError> {
        Self::with_seen(config, source, SeenUrlSet::new())
    }

    /// Create a manager that treats `seen` as already downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Config`] if either limit is zero.
    pub fn with_seen(
        config: DownloadConfig,
        source: Arc<dyn MediaSource>,
        seen: SeenUrlSet,
    ) -> Result<Self, DownloadError> {
        if config.max_concurrent == 0 {
            return Err(DownloadError::Config(
                "max_concurrent_downloads must be greater than zero".into(),
            ));
        }
        if config.chunk_size == 0 {
            return Err(DownloadError::Config(
                "chunk_size must be greater than zero".into(),
            ));
        }

        Ok(Self {
            config,
            source,
            slots: Semaphore::new(config.max_concurrent),
            ledger: Mutex::new(Ledger {
                seen,
                in_flight: HashSet::new(),
            }),
            sink: Arc::new(NullSink),
            cancel: None,
        })
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Abort waiting and in-flight transfers once `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn config(&self) -> DownloadConfig {
        self.config
    }

    /// Whether `url` has been downloaded during this run.
    #[must_use]
    pub fn has_seen(&self, url: &str) -> bool {
        self.ledger
            .lock()
            .map(|ledger| ledger.seen.contains(url))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.ledger.lock().map(|l| l.seen.len()).unwrap_or(0)
    }

    /// Download one request.
    ///
    /// Returns `None` when the URL was skipped as already seen or already
    /// in flight. Every other path returns an outcome; failures are
    /// reported in it, never as a panic or error.
    pub async fn submit(&self, request: DownloadRequest) -> Option<DownloadOutcome> {
        let Some(_claim) = self.claim(&request.url) else {
            log::debug!("Already fetched or in flight, skipping {}", request.url);
            return None;
        };

        Some(self.run(&request).await)
    }

    fn claim(&self, url: &str) -> Option<Claim<'_>> {
        let mut ledger = self.ledger.lock().ok()?;
        if ledger.seen.contains(url) || !ledger.in_flight.insert(url.to_string()) {
            return None;
        }
        Some(Claim {
            ledger: &self.ledger,
            url: url.to_string(),
        })
    }

    fn mark_seen(&self, url: &str) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.seen.insert(url);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    async fn run(&self, request: &DownloadRequest) -> DownloadOutcome {
        // Slot wait is abandoned silently on cancellation: nothing started.
        let acquired = tokio::select! {
            biased;
            () = wait_cancelled(self.cancel.as_ref()) => Err(DownloadError::Cancelled),
            permit = self.slots.acquire() => permit.map_err(|_| DownloadError::SlotsClosed),
        };
        let download_id = request.download_id();
        let _permit = match acquired {
            Ok(permit) => permit,
            Err(e) => return DownloadOutcome::failed(download_id, 0, 0, e.to_string()),
        };

        self.emit(request, DownloadPhase::Started, 0, 0, None);

        let mut transfer = Transfer::default();
        let temp = TempFile::new(request.temp_path());
        match self.transfer(request, temp.path(), &mut transfer).await {
            Ok(()) => {
                temp.keep();
                self.mark_seen(&request.url);
                let written = transfer.written;
                self.emit(request, DownloadPhase::Completed, written, written, None);
                log::debug!("Downloaded {} ({} bytes)", download_id, written);
                DownloadOutcome::completed(download_id, written)
            }
            Err(e) => {
                drop(temp);
                let message = e.to_string();
                log::warn!("Download of {} failed: {}", request.url, message);
                self.emit(
                    request,
                    DownloadPhase::Failed,
                    transfer.written,
                    transfer.total,
                    Some(message.clone()),
                );
                DownloadOutcome::failed(download_id, transfer.written, transfer.total, message)
            }
        }
    }

    async fn transfer(
        &self,
        request: &DownloadRequest,
        temp: &Path,
        transfer: &mut Transfer,
    ) -> Result<(), DownloadError> {
        let mut body = tokio::select! {
            biased;
            () = wait_cancelled(self.cancel.as_ref()) => return Err(DownloadError::Cancelled),
            body = self.source.open(&request.url) => body?,
        };

        transfer.total = body.content_length().unwrap_or(0);
        self.emit(request, DownloadPhase::Started, 0, transfer.total, None);

        let mut file = tokio::fs::File::create(temp)
            .await
            .map_err(|e| DownloadError::io(temp, e))?;

        loop {
            if self.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let chunk = tokio::select! {
                biased;
                () = wait_cancelled(self.cancel.as_ref()) => return Err(DownloadError::Cancelled),
                chunk = body.next_chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            for piece in chunk.chunks(self.config.chunk_size) {
                file.write_all(piece)
                    .await
                    .map_err(|e| DownloadError::io(temp, e))?;
                transfer.written += piece.len() as u64;
                self.emit(
                    request,
                    DownloadPhase::InProgress,
                    transfer.written,
                    transfer.total,
                    None,
                );
            }
        }

        file.flush().await.map_err(|e| DownloadError::io(temp, e))?;
        file.sync_all().await.map_err(|e| DownloadError::io(temp, e))?;
        drop(file);

        let destination = request.destination();
        tokio::fs::rename(temp, &destination)
            .await
            .map_err(|e| DownloadError::io(&destination, e))?;

        if transfer.total != 0 && transfer.total != transfer.written {
            log::debug!(
                "{}: declared {} bytes, received {}",
                request.download_id(),
                transfer.total,
                transfer.written
            );
        }
        Ok(())
    }

    fn emit(
        &self,
        request: &DownloadRequest,
        phase: DownloadPhase,
        current_bytes: u64,
        total_bytes: u64,
        error: Option<String>,
    ) {
        log::trace!(
            "{} {} {}/{}",
            request.download_id(),
            phase,
            current_bytes,
            total_bytes
        );
        self.sink.on_download(&ProgressEvent {
            download_id: request.download_id(),
            current_bytes,
            total_bytes,
            phase,
            error,
            filename: request.filename.clone(),
            url: request.url.clone(),
        });
    }
}

#[derive(Debug, Default)]
struct Transfer {
    written: u64,
    total: u64,
}

/// In-flight registration of one URL, released on drop.
struct Claim<'a> {
    ledger: &'a Mutex<Ledger>,
    url: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut ledger = self
            .ledger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ledger.in_flight.remove(&self.url);
    }
}

/// A `.part` file that is deleted on drop unless kept.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file has been renamed into place; leave the path alone.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::trace!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}
