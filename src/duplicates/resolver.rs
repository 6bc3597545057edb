//! Duplicate resolution engine.
//!
//! # Pipeline
//!
//! 1. **List**: immediate media files of the directory (blocking task).
//! 2. **Size filter**: drop files whose size no other file shares.
//! 3. **Fingerprint**: each remaining file is hashed on a dedicated rayon
//!    pool. Results come back over a tokio channel, so the async caller is
//!    never blocked by CPU work and never holds a download slot while
//!    waiting.
//! 4. **Group**: by [`SignatureKey`](super::SignatureKey); kinds and sizes
//!    never mix.
//! 5. **Remove**: every group member except the oldest (blocking task).
//!
//! Progress is reported through a [`ProgressSink`] in batches, and a final
//! event with a terminal status is emitted exactly once per run, including
//! runs that scan nothing or fail early.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use super::groups::{group_by_signature, group_by_size, SignatureGroup};
use crate::actions::{remove_duplicate, RemovalMode};
use crate::progress::{DuplicateRemovalProgress, NullSink, ProgressSink, RemovalStatus};
use crate::scanner::{
    list_media, ContentHasher, FileSignature, Fingerprinter, HashAlgorithm, MediaClassifier,
    MediaFile, PerceptualHasher, ScanError, DEFAULT_HASH_CHUNK_SIZE,
};
use crate::signal::CancelToken;

/// Default number of completions between progress events.
pub const DEFAULT_PROGRESS_BATCH: usize = 5;

/// Default extensions hashed as opaque bytes.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "m4v"];

/// Errors that stop a resolution run as a whole.
///
/// Per-file failures never surface here; they are logged and counted.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Invalid engine configuration.
    #[error("Invalid resolver configuration: {0}")]
    Config(String),

    /// No extensions to scan for.
    #[error("No media extensions given for {0}")]
    NoExtensions(PathBuf),

    /// The directory could not be listed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The fingerprint pool could not be built.
    #[error("Failed to build fingerprint pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A blocking task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Extensions hashed as opaque bytes.
    pub video_extensions: Vec<String>,
    /// Hash animated images (GIF) as bytes instead of pixels.
    pub animated_as_video: bool,
    pub hash_algorithm: HashAlgorithm,
    /// Read size for cryptographic hashing.
    pub fingerprint_chunk_size: usize,
    /// Fingerprint pool size; 0 means one thread per core.
    pub fingerprint_threads: usize,
    /// Completions between progress events.
    pub progress_batch: usize,
    pub removal_mode: RemovalMode,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            animated_as_video: false,
            hash_algorithm: HashAlgorithm::default(),
            fingerprint_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            fingerprint_threads: 0,
            progress_batch: DEFAULT_PROGRESS_BATCH,
            removal_mode: RemovalMode::default(),
        }
    }
}

impl ResolverConfig {
    fn validate(&self) -> Result<(), ResolverError> {
        if self.fingerprint_chunk_size == 0 {
            return Err(ResolverError::Config(
                "fingerprint_chunk_size must be greater than zero".into(),
            ));
        }
        if self.progress_batch == 0 {
            return Err(ResolverError::Config(
                "progress_batch must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Final tally of one resolution run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub directory: PathBuf,
    pub files_scanned: usize,
    /// Files that shared a size with another file.
    pub candidates: usize,
    /// Candidates that were fingerprinted.
    pub files_processed: usize,
    /// Fingerprinted files with no usable signature.
    pub unreadable: usize,
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
    pub bytes_freed: u64,
    /// Copies that could not be removed, with the reason.
    pub failed_removals: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

/// Collapses duplicate media in a directory to one canonical copy.
pub struct DuplicateResolver {
    config: ResolverConfig,
    fingerprinter: Fingerprinter,
    pool: Arc<rayon::ThreadPool>,
    sink: Arc<dyn ProgressSink>,
    cancel: Option<CancelToken>,
}

impl std::fmt::Debug for DuplicateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateResolver")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .field("sink", &"<sink>")
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl DuplicateResolver {
    /// Build an engine and its fingerprint pool.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Config`] for zero chunk or batch sizes and
    /// [`ResolverError::ThreadPool`] if the pool cannot be started.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.fingerprint_threads)
            .thread_name(|i| format!("fingerprint-{i}"))
            .build()?;

        let fingerprinter = Fingerprinter::new(
            ContentHasher::new(config.hash_algorithm, config.fingerprint_chunk_size),
            PerceptualHasher::default(),
        );

        log::debug!(
            "Fingerprint pool ready with {} thread(s)",
            pool.current_num_threads()
        );

        Ok(Self {
            config,
            fingerprinter,
            pool: Arc::new(pool),
            sink: Arc::new(NullSink),
            cancel: None,
        })
    }

    /// Report progress to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stop scheduling work once `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.fingerprinter = Fingerprinter::new(
            self.fingerprinter
                .content_hasher()
                .clone()
                .with_cancel_token(token.clone()),
            PerceptualHasher::default(),
        );
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Remove duplicates from `directory`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_with_report`].
    pub async fn resolve<S: AsRef<str>>(
        &self,
        directory: &Path,
        allowed_extensions: &[S],
    ) -> Result<usize, ResolverError> {
        self.resolve_with_report(directory, allowed_extensions)
            .await
            .map(|report| report.duplicates_removed)
    }

    /// Remove duplicates from `directory` and return the full tally.
    ///
    /// # Errors
    ///
    /// Fails only when no extensions are given, the directory cannot be
    /// listed, or a background task dies. A final `failed` progress event
    /// is still emitted in those cases.
    pub async fn resolve_with_report<S: AsRef<str>>(
        &self,
        directory: &Path,
        allowed_extensions: &[S],
    ) -> Result<ResolutionReport, ResolverError> {
        let tracker = Arc::new(Tracker::new(
            directory.to_path_buf(),
            Arc::clone(&self.sink),
            self.config.progress_batch,
        ));

        match self.run(directory, allowed_extensions, &tracker).await {
            Ok(report) => {
                let status = if report.cancelled {
                    RemovalStatus::Failed
                } else {
                    RemovalStatus::Completed
                };
                tracker.finish(status);
                log::info!(
                    "{}: {} scanned, {} duplicate(s) found, {} removed",
                    directory.display(),
                    report.files_scanned,
                    report.duplicates_found,
                    report.duplicates_removed
                );
                Ok(report)
            }
            Err(e) => {
                tracker.finish(RemovalStatus::Failed);
                log::warn!("Duplicate removal failed for {}: {}", directory.display(), e);
                Err(e)
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    async fn run<S: AsRef<str>>(
        &self,
        directory: &Path,
        allowed_extensions: &[S],
        tracker: &Arc<Tracker>,
    ) -> Result<ResolutionReport, ResolverError> {
        let classifier = MediaClassifier::new(
            allowed_extensions,
            &self.config.video_extensions,
            self.config.animated_as_video,
        );
        if classifier.is_empty() {
            return Err(ResolverError::NoExtensions(directory.to_path_buf()));
        }

        let dir = directory.to_path_buf();
        let listing =
            tokio::task::spawn_blocking(move || list_media(&dir, &classifier)).await??;

        let mut report = ResolutionReport {
            directory: directory.to_path_buf(),
            files_scanned: listing.files.len(),
            ..ResolutionReport::default()
        };
        tracker.start(report.files_scanned);

        let (size_groups, stats) = group_by_size(listing.files);
        report.candidates = stats.potential_duplicates;
        let candidates: Vec<MediaFile> = size_groups.into_iter().flat_map(|g| g.files).collect();

        let signed = self.fingerprint_all(candidates, tracker).await;
        report.files_processed = signed.len();
        report.unreadable = signed.iter().filter(|(sig, _)| sig.is_empty()).count();

        if self.is_cancelled() {
            log::info!("Cancelled before removal in {}", directory.display());
            report.cancelled = true;
            return Ok(report);
        }

        let groups = group_by_signature(signed);
        report.duplicates_found = groups.iter().map(SignatureGroup::duplicate_count).sum();
        tracker.found(report.duplicates_found);

        if !groups.is_empty() {
            let removal = self.remove_all(groups, Arc::clone(tracker)).await?;
            report.duplicates_removed = removal.removed;
            report.bytes_freed = removal.bytes_freed;
            report.failed_removals = removal.failures;
            report.cancelled = removal.cancelled;
        }

        Ok(report)
    }

    /// Fingerprint every candidate on the rayon pool.
    ///
    /// Jobs that start after cancellation send nothing back.
    async fn fingerprint_all(
        &self,
        candidates: Vec<MediaFile>,
        tracker: &Tracker,
    ) -> Vec<(FileSignature, MediaFile)> {
        let expected = candidates.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<(FileSignature, MediaFile)>();

        for file in candidates {
            if self.is_cancelled() {
                break;
            }
            let tx = tx.clone();
            let fingerprinter = self.fingerprinter.clone();
            let cancel = self.cancel.clone();
            self.pool.spawn(move || {
                if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                    return;
                }
                let signature = fingerprinter.fingerprint(&file);
                let _ = tx.send((signature, file));
            });
        }
        drop(tx);

        let mut signed = Vec::with_capacity(expected);
        while let Some(result) = rx.recv().await {
            signed.push(result);
            tracker.processed(signed.len());
        }
        signed
    }

    /// Delete redundant group members on a blocking thread.
    async fn remove_all(
        &self,
        groups: Vec<SignatureGroup>,
        tracker: Arc<Tracker>,
    ) -> Result<RemovalTally, ResolverError> {
        let mode = self.config.removal_mode;
        let cancel = self.cancel.clone();

        let tally = tokio::task::spawn_blocking(move || {
            let mut tally = RemovalTally::default();
            for group in &groups {
                if let Some(keep) = group.canonical() {
                    log::debug!(
                        "Keeping {} ({} cop{} to remove)",
                        keep.path.display(),
                        group.duplicate_count(),
                        if group.duplicate_count() == 1 { "y" } else { "ies" }
                    );
                }
                for file in group.redundant() {
                    if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                        tally.cancelled = true;
                        return tally;
                    }
                    match remove_duplicate(file, mode) {
                        Ok(result) => {
                            tally.removed += 1;
                            tally.bytes_freed += result.size;
                            tracker.removed(tally.removed);
                        }
                        Err(e) => {
                            log::warn!("Could not remove duplicate {}: {}", file.path.display(), e);
                            tally.failures.push((file.path.clone(), e.to_string()));
                        }
                    }
                }
            }
            tally
        })
        .await?;

        Ok(tally)
    }
}

#[derive(Debug, Default)]
struct RemovalTally {
    removed: usize,
    bytes_freed: u64,
    failures: Vec<(PathBuf, String)>,
    cancelled: bool,
}

/// Batched progress emission with a single terminal event.
struct Tracker {
    state: Mutex<TrackerState>,
    sink: Arc<dyn ProgressSink>,
    batch: usize,
}

struct TrackerState {
    progress: DuplicateRemovalProgress,
    finished: bool,
}

impl Tracker {
    fn new(directory: PathBuf, sink: Arc<dyn ProgressSink>, batch: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                progress: DuplicateRemovalProgress::new(directory),
                finished: false,
            }),
            sink,
            batch: batch.max(1),
        }
    }

    /// Apply `f`, then emit a snapshot if `emit` says so.
    fn update(
        &self,
        emit: impl FnOnce(&DuplicateRemovalProgress) -> bool,
        f: impl FnOnce(&mut DuplicateRemovalProgress),
    ) {
        let snapshot = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.finished {
                return;
            }
            f(&mut state.progress);
            if !emit(&state.progress) {
                return;
            }
            state.progress.clone()
        };
        self.sink.on_removal(&snapshot);
    }

    fn start(&self, files_scanned: usize) {
        self.update(
            |_| true,
            |p| {
                p.files_scanned = files_scanned;
                p.status = RemovalStatus::Running;
            },
        );
    }

    fn processed(&self, files_processed: usize) {
        let batch = self.batch;
        self.update(
            |p| p.files_processed % batch == 0,
            |p| p.files_processed = files_processed,
        );
    }

    fn found(&self, duplicates_found: usize) {
        self.update(|_| true, |p| p.duplicates_found = duplicates_found);
    }

    fn removed(&self, duplicates_removed: usize) {
        let batch = self.batch;
        self.update(
            |p| p.duplicates_removed % batch == 0,
            |p| p.duplicates_removed = duplicates_removed,
        );
    }

    fn finish(&self, status: RemovalStatus) {
        let snapshot = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.finished {
                return;
            }
            state.finished = true;
            state.progress.status = status;
            state.progress.clone()
        };
        self.sink.on_removal(&snapshot);
    }
}
